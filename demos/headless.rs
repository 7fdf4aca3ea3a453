//! Drive the streaming engine without a renderer: hover over a few cities,
//! orbit and zoom, and print how the tile pyramid fills in.
//!
//! Uses the deterministic solid-color fetcher so it runs without network
//! access; swap in `TileSource::with_http` to stream real imagery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tinyearth::{
    Camera, Projection, SolidFetcher, TileProvider, TileProviderOptions, TileSource,
};

async fn drain(provider: &TileProvider) {
    while provider.stats().pending > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("tinyearth headless demo");
    println!("=======================");

    let source = TileSource::new(
        "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        Arc::new(SolidFetcher::default()),
    )?;
    let provider = TileProvider::new(
        Projection::default(),
        source,
        TileProviderOptions::default(),
    );

    let cities = [
        ("Nanjing", 118.767335, 32.050471),
        ("San Francisco", -122.4194, 37.7749),
        ("London", -0.1278, 51.5074),
    ];

    for (name, lon, lat) in cities {
        let mut camera = Camera::above(lon, lat, 1.0e6);
        provider.attach(&mut camera);
        provider.refresh(&camera);
        drain(&provider).await;

        // Dive in two zoom steps and nudge the view the way an interactive
        // session would.
        camera.zoom(0.25);
        drain(&provider).await;
        camera.orbit(5.0, -10.0);
        camera.pan(20_000.0, 0.0);
        drain(&provider).await;

        let level = provider.current_level();
        let tree = provider.tree();
        let (ready, committed) = tree.lock().unwrap().ready_count_at_level(level);
        println!(
            "{name:>14}: level {level}, {ready}/{committed} committed tiles ready, \
             precision drift {:.3e}",
            camera.precision_drift()
        );
    }

    println!("final stats: {}", serde_json::to_string_pretty(&provider.stats())?);
    Ok(())
}
