use crate::host::{NavigateEvent, NavigationSource};
use futures_channel::mpsc;
use futures_util::{future, StreamExt};
use regex::Regex;
use url::Url;

/// Which locations count as the target page.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Whole-URL equality.
    Exact(String),
    /// Regex tested against the URL path only.
    Pattern(Regex),
}

impl Destination {
    pub fn exact(url: impl Into<String>) -> Self {
        Destination::Exact(url.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Destination::Pattern(Regex::new(pattern)?))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Destination::Exact(expected) => normalize(url) == normalize(expected),
            Destination::Pattern(pattern) => match Url::parse(url) {
                Ok(parsed) => pattern.is_match(parsed.path()),
                Err(err) => {
                    log::debug!("cannot parse {url}: {err}");
                    false
                }
            },
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Exact(url) => f.write_str(url),
            Destination::Pattern(pattern) => f.write_str(pattern.as_str()),
        }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}

/// Hash-only jumps and downloads never leave the current page.
fn leaves_page(event: &NavigateEvent) -> bool {
    !event.hash_change && event.download_request.is_none()
}

/// Resolves once the host is on a location matching `destination`.
///
/// Returns at once if the current location already matches; otherwise listens
/// to intercepted navigations until one lands on a match.
pub async fn wait_for<N>(navigation: &N, destination: &Destination)
where
    N: NavigationSource + ?Sized,
{
    log::debug!("will wait for location {destination}");
    let current = navigation.current_url();
    if destination.matches(&current) {
        log::debug!("already on matching location {current}");
        return;
    }

    let (forward, mut events) = mpsc::unbounded::<NavigateEvent>();
    let _listener = navigation.subscribe(Box::new(move |event| {
        let _ = forward.unbounded_send(event);
    }));

    while let Some(event) = events.next().await {
        if !leaves_page(&event) {
            continue;
        }
        log::debug!("navigating to: {}", event.destination);
        if destination.matches(&event.destination) {
            log::debug!("navigated to matching location {}", event.destination);
            return;
        }
    }

    future::pending().await
}
