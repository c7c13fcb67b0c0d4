use hyper::http::Uri;

/// Resolve a Location header value against the URI of the request which returned it
pub fn resolve_location(base_uri: &Uri, location: &str) -> Option<Uri> {
    let location: Uri = location.trim().parse().ok()?;
    if location.scheme().is_some() {
        return Some(location);
    }
    Uri::builder()
        .scheme(base_uri.scheme()?.clone())
        .authority(base_uri.authority()?.clone())
        .path_and_query(location.path_and_query()?.clone())
        .build()
        .ok()
}

pub fn same_origin(a: &Uri, b: &Uri) -> bool {
    a.scheme() == b.scheme() && a.authority() == b.authority()
}
