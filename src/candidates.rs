use serde_json::{Map, Value};
use tracing::debug;

/// Field holding a direct media URL in TikTok item payloads.
pub const DOWNLOAD_ADDR: &str = "downloadAddr";

/// Nesting level past which subtrees are not inspected.
pub const MAX_DEPTH: usize = 64;

/// Collect every string stored under a `downloadAddr` key anywhere in `node`, in
/// document order. Duplicates are kept.
pub fn collect_download_addrs(node: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    walk(node, 0, &mut urls);
    urls
}

/// [`collect_download_addrs`] for a bare JSON object, such as a canonical item.
pub fn collect_from_object(map: &Map<String, Value>) -> Vec<String> {
    let mut urls = Vec::new();
    walk_object(map, 0, &mut urls);
    urls
}

fn walk(node: &Value, depth: usize, urls: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        debug!(depth, "skipping subtree beyond depth guard");
        return;
    }

    match node {
        Value::Object(map) => walk_object(map, depth, urls),
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, urls);
            }
        }
        _ => {}
    }
}

fn walk_object(map: &Map<String, Value>, depth: usize, urls: &mut Vec<String>) {
    for (key, value) in map {
        match value {
            Value::String(url) if key == DOWNLOAD_ADDR => urls.push(url.clone()),
            _ => walk(value, depth + 1, urls),
        }
    }
}
