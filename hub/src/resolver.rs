use std::{collections::VecDeque, sync::Mutex};

use log::trace;
use url::Url;

use meshlink_shared::Uri;

/// Resolves node URIs received from the peer against the connection's base
/// URI, memoizing the most recently used results.
///
/// Results are a pure function of `(base, relative)`; the cache is skipped
/// whenever another thread holds it.
pub struct UriResolver {
    capacity: usize,
    cache: Mutex<ResolverCache>,
}

struct ResolverCache {
    base: Option<Url>,
    /// Least recently used first
    entries: VecDeque<(Uri, Uri)>,
}

impl UriResolver {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cache: Mutex::new(ResolverCache {
                base: None,
                entries: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resolves `relative` against `base`. References without an authority
    /// of their own come back without one, so nothing of the peer's address
    /// leaks into local node URIs.
    pub fn resolve(&self, base: &Url, relative: &Uri) -> Uri {
        if let Some(resolved) = self.cached(base, relative) {
            return resolved;
        }
        let resolved = resolve_uncached(base, relative);
        self.remember(base, relative, &resolved);
        resolved
    }

    /// Maps an absolute node URI back to the form the peer addresses it by:
    /// URIs on the peer's own host lose their scheme and authority, anything
    /// else is returned as is.
    pub fn unresolve(&self, base: &Url, absolute: &Uri) -> Uri {
        match absolute.authority() {
            Some(authority) if authority.eq_ignore_ascii_case(&authority_of(base)) => {
                let path = absolute.path_and_query();
                if path.is_empty() {
                    Uri::new("/")
                } else {
                    Uri::new(path)
                }
            }
            _ => absolute.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.cache.lock() {
            Ok(cache) => cache.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut cache = match self.cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.base = None;
        cache.entries.clear();
    }

    fn cached(&self, base: &Url, relative: &Uri) -> Option<Uri> {
        let mut cache = self.cache.try_lock().ok()?;
        if cache.base.as_ref() != Some(base) {
            return None;
        }
        let index = cache
            .entries
            .iter()
            .position(|(key, _)| key == relative)?;
        let entry = cache.entries.remove(index)?;
        let resolved = entry.1.clone();
        cache.entries.push_back(entry);
        Some(resolved)
    }

    fn remember(&self, base: &Url, relative: &Uri, resolved: &Uri) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut cache) = self.cache.try_lock() else {
            return;
        };
        if cache.base.as_ref() != Some(base) {
            trace!("resolver base changed to {}", base);
            cache.base = Some(base.clone());
            cache.entries.clear();
        }
        if cache.entries.iter().any(|(key, _)| key == relative) {
            return;
        }
        while cache.entries.len() >= self.capacity {
            cache.entries.pop_front();
        }
        cache.entries.push_back((relative.clone(), resolved.clone()));
    }
}

fn resolve_uncached(base: &Url, relative: &Uri) -> Uri {
    // opaque references such as `swim:meta:host` have nothing to resolve
    if relative.scheme().is_some() && !relative.has_authority() {
        return relative.clone();
    }
    let joined = match base.join(relative.as_str()) {
        Ok(joined) => joined,
        Err(error) => {
            trace!("leaving {} unresolved: {}", relative, error);
            return relative.clone();
        }
    };
    if relative.has_authority() {
        return Uri::new(String::from(joined));
    }
    let mut resolved = String::from(joined.path());
    if let Some(query) = joined.query() {
        resolved.push('?');
        resolved.push_str(query);
    }
    if let Some(fragment) = joined.fragment() {
        resolved.push('#');
        resolved.push_str(fragment);
    }
    Uri::new(resolved)
}

fn authority_of(base: &Url) -> String {
    let host = base.host_str().unwrap_or_default();
    match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
