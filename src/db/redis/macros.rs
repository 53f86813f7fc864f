/// Returns a cached value, or computes, stores and returns it.
///
/// `$cache` needs `get_from_cache` and `set_in_background`; `$ttl` is in
/// seconds. Writes happen in the background, so a miss costs one Redis read.
///
/// # Example
/// ```rust,ignore
/// let song: SongRecord = cached!(cache, CacheKey::Track(id.clone()), TRACK_CACHE_TTL, async {
///     fetch_track(&id).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_from_cache(&key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
