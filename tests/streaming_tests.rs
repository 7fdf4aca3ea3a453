//! Provider round trips against a deterministic fetcher: camera events in,
//! resident quadtree tiles out.

use std::sync::Arc;
use std::time::Duration;

use tinyearth::{
    Camera, Projection, SolidFetcher, TileKey, TileProvider, TileProviderOptions, TileSource,
};

const LON: f64 = 118.767335;
const LAT: f64 = 32.050471;

fn provider(max_level: u8) -> TileProvider {
    let source = TileSource::new("{z}/{x}/{y}", Arc::new(SolidFetcher::default())).unwrap();
    TileProvider::new(
        Projection::default(),
        source,
        TileProviderOptions {
            min_level: 1,
            max_level,
        },
    )
}

async fn drain(provider: &TileProvider) {
    for _ in 0..1000 {
        if provider.stats().pending == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("fetches did not drain: {:?}", provider.stats());
}

#[tokio::test]
async fn test_bfs_streams_tiles_around_the_nadir() {
    let provider = provider(12);
    // 100 km up: the altitude formula lands on level 9, above the bootstrap
    // grid, so scheduling goes through the visibility-pruned BFS.
    let camera = Camera::above(LON, LAT, 1.0e5);
    let level = provider.tile_level(&camera);
    assert_eq!(level, 9);

    provider.refresh(&camera);
    drain(&provider).await;

    let stats = provider.stats();
    assert!(stats.scheduled > 0, "nothing scheduled");
    assert_eq!(stats.failed, 0);

    // The tile straight below the camera must be resident.
    let nadir = TileKey::new(15, 27194, 13301).ancestor_at(level).unwrap();
    let tree = provider.tree();
    let tree = tree.lock().unwrap();
    let node = tree
        .get_tile_node(nadir.z, nadir.x, nadir.y)
        .expect("nadir tile missing from the tree");
    assert!(node.tile.as_ref().unwrap().is_ready());

    // Everything fetched landed at the target level.
    let (ready, _) = tree.ready_count_at_level(level);
    assert_eq!(ready as u64, stats.fetched);
}

#[tokio::test]
async fn test_bootstrap_level_fetches_the_full_grid() {
    let provider = provider(12);
    // Whole-globe view: level 3 is at or below the bootstrap threshold, so
    // the full 8x8 grid goes out with no culling.
    let camera = Camera::above(LON, LAT, 6.0e6);
    let level = provider.tile_level(&camera);
    assert_eq!(level, 3);

    provider.refresh(&camera);
    drain(&provider).await;

    let tree = provider.tree();
    let (ready, total) = tree.lock().unwrap().ready_count_at_level(3);
    assert_eq!(ready, 64);
    assert_eq!(total, 64);
}

#[tokio::test]
async fn test_loading_progress_signal() {
    let provider = provider(12);
    let camera = Camera::above(LON, LAT, 6.0e6);
    provider.refresh(&camera);
    drain(&provider).await;

    // After the bootstrap grid drains, the none/some ratio reads complete.
    let tree = provider.tree();
    let tree = tree.lock().unwrap();
    let mut some = 0usize;
    let mut none = 0usize;
    tree.for_each_tiles_of_level(3, |t| match t {
        Some(_) => some += 1,
        None => none += 1,
    });
    assert_eq!(some, 64);
    assert_eq!(none, 0);
}

#[tokio::test]
async fn test_rescheduling_skips_resident_tiles() {
    let provider = provider(12);
    let mut camera = Camera::above(LON, LAT, 6.0e6);
    provider.attach(&mut camera);

    provider.refresh(&camera);
    drain(&provider).await;
    let first = provider.stats().scheduled;
    assert_eq!(first, 64);

    // A pan at the same level re-walks the pyramid but finds every tile
    // already resident.
    camera.pan(1_000.0, 0.0);
    drain(&provider).await;
    assert_eq!(provider.stats().scheduled, first);
}

#[tokio::test]
async fn test_out_of_order_completion_is_safe() {
    // Fetch a parent and child out of order straight through the source and
    // insert manually; the tree accepts both regardless of arrival order.
    let source = TileSource::new("{z}/{x}/{y}", Arc::new(SolidFetcher::default())).unwrap();
    let child = source.make_tile(TileKey::new(4, 3, 5));
    let parent = source.make_tile(TileKey::new(3, 1, 2));

    let fetched = futures::future::join_all([source.fetch_tile(child), source.fetch_tile(parent)])
        .await;

    let mut tree = tinyearth::TileTree::new();
    for tile in fetched.into_iter().flatten() {
        tree.add_tile(tile);
    }
    assert!(tree.get_tile_node(4, 3, 5).is_some());
    assert!(tree.get_tile_node(3, 1, 2).is_some());
}
