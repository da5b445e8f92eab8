//! Tiled JPEG TIFF pyramids served end to end.
//!
//! Tests verify:
//! - Level count and grid of a large pyramid
//! - Corner tiles, out-of-range tiles and bad coordinates
//! - JPEG passthrough versus re-encoding
//! - BigTIFF containers and sparse pyramids
//! - Levels stored with rounded-down sizes
//! - Concurrent reads through one open file

use std::sync::Arc;

use tokio::task::JoinSet;

use tile_pyramid::{
    detect_format, is_tiff_header, ContainerFormat, Params, TileCoord, TileRequest, TileSource,
};

use super::test_utils::{
    create_service, decoded_size, is_jpeg, is_png, write_file, PyramidBuilder,
};

const WIDE_X: u32 = 58368;
const WIDE_Y: u32 = 12288;

fn wide_pyramid() -> Vec<u8> {
    PyramidBuilder::new(WIDE_X, WIDE_Y, 256).build()
}

// =============================================================================
// Container
// =============================================================================

#[test]
fn test_builder_output_is_tiff() {
    let data = wide_pyramid();
    assert!(is_tiff_header(&data));
    assert_eq!(detect_format(&data), Some(ContainerFormat::Tiff));

    let big = PyramidBuilder::new(512, 512, 256).with_bigtiff(true).build();
    assert_eq!(&big[..4], &[b'I', b'I', 43, 0]);
    assert!(is_tiff_header(&big));
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_wide_pyramid_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wide.tif", &wide_pyramid());
    let service = create_service(dir.path());

    let meta = service.metadata("wide.tif", &Params::new()).await.unwrap();
    assert_eq!(meta.size_x, WIDE_X);
    assert_eq!(meta.size_y, WIDE_Y);
    assert_eq!(meta.tile_width, 256);
    assert_eq!(meta.tile_height, 256);
    assert_eq!(meta.levels, 9);
    assert_eq!(meta.min_level, 0);
    assert_eq!(meta.tiles_across(8), 228);
    assert_eq!(meta.tiles_down(8), 48);
    assert_eq!(meta.tiles_across(0), 1);

    let json = serde_json::to_value(meta).unwrap();
    assert_eq!(json["sizeX"], 58368);
    assert_eq!(json["levels"], 9);
}

// =============================================================================
// Tiles
// =============================================================================

#[tokio::test]
async fn test_corner_tiles_of_top_level() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wide.tif", &wide_pyramid());
    let service = create_service(dir.path());

    for (x, y) in [(0, 0), (227, 0), (0, 47), (227, 47)] {
        let response = service
            .get_tile(&TileRequest::new("wide.tif", 8, x, y))
            .await
            .unwrap();
        assert!(is_jpeg(&response.image.data), "tile ({}, {})", x, y);
        assert_eq!(response.image.mime_type(), "image/jpeg");
    }
}

#[tokio::test]
async fn test_tile_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wide.tif", &wide_pyramid());
    let service = create_service(dir.path());

    let cases = [
        ((9, 0, 0), "z layer does not exist", 404),
        ((8, -1, 0), "x, y, and z must be positive integers", 400),
        ((8, 228, 0), "x is outside layer", 404),
        ((8, 0, 48), "y is outside layer", 404),
        ((0, 1, 0), "x is outside layer", 404),
    ];
    for ((z, x, y), message, status) in cases {
        let err = service
            .get_tile(&TileRequest::new("wide.tif", z, x, y))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), message, "tile {}/{}/{}", z, x, y);
        assert_eq!(err.status_code().as_u16(), status);
    }

    let err = TileCoord::parse("8", "a", "0").unwrap_err();
    assert_eq!(err.to_string(), "x, y, and z must be integers");
}

#[tokio::test]
async fn test_passthrough_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wide.tif", &wide_pyramid());
    let service = create_service(dir.path());

    let request = TileRequest::new("wide.tif", 8, 3, 5);
    let first = service.get_tile(&request).await.unwrap();
    service.clear_cache().await;
    let second = service.get_tile(&request).await.unwrap();
    assert!(!second.cache_hit);
    assert_eq!(first.image.data, second.image.data);

    // Every tile shares one stored frame, so passthrough tiles are identical
    let other = service
        .get_tile(&TileRequest::new("wide.tif", 8, 100, 20))
        .await
        .unwrap();
    assert_eq!(first.image.data, other.image.data);
}

#[tokio::test]
async fn test_png_and_reencoded_tiles() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "small.tif",
        &PyramidBuilder::new(1024, 768, 256).build(),
    );
    let service = create_service(dir.path());

    let png = service
        .get_tile(
            &TileRequest::new("small.tif", 2, 1, 1)
                .with_params(Params::new().with("encoding", "PNG")),
        )
        .await
        .unwrap();
    assert!(is_png(&png.image.data));
    assert_eq!(decoded_size(&png.image.data), (256, 256));

    let passthrough = service
        .get_tile(&TileRequest::new("small.tif", 2, 1, 1))
        .await
        .unwrap();
    let reencoded = service
        .get_tile(
            &TileRequest::new("small.tif", 2, 1, 1)
                .with_params(Params::new().with("jpegQuality", 40).with("jpegSubsampling", 2)),
        )
        .await
        .unwrap();
    assert!(is_jpeg(&reencoded.image.data));
    assert_ne!(passthrough.image.data, reencoded.image.data);

    let err = service
        .get_tile(
            &TileRequest::new("small.tif", 2, 0, 0)
                .with_params(Params::new().with("jpegSubsampling", 3)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_bigtiff_tiles() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "big.tif",
        &PyramidBuilder::new(600, 300, 256).with_bigtiff(true).build(),
    );
    let service = create_service(dir.path());

    let meta = service.metadata("big.tif", &Params::new()).await.unwrap();
    assert_eq!(meta.levels, 3);
    let tile = service
        .get_tile(&TileRequest::new("big.tif", 2, 2, 1))
        .await
        .unwrap();
    assert!(is_jpeg(&tile.image.data));
}

// =============================================================================
// Sparse pyramids
// =============================================================================

#[tokio::test]
async fn test_missing_levels_are_composed() {
    let dir = tempfile::tempdir().unwrap();
    // Full resolution and 4x only; level 1 has no directory
    write_file(
        dir.path(),
        "sparse.tif",
        &PyramidBuilder::new(1024, 1024, 256)
            .with_halvings(&[0, 2])
            .with_color([20, 180, 60])
            .build(),
    );
    let service = create_service(dir.path());

    let meta = service.metadata("sparse.tif", &Params::new()).await.unwrap();
    assert_eq!(meta.levels, 3);
    assert_eq!(meta.min_level, 0);

    let composed = service
        .get_tile(&TileRequest::new("sparse.tif", 1, 1, 0))
        .await
        .unwrap();
    assert!(is_jpeg(&composed.image.data));
    assert_eq!(decoded_size(&composed.image.data), (256, 256));

    let img = image::load_from_memory(&composed.image.data)
        .unwrap()
        .to_rgb8();
    let px = img.get_pixel(128, 128);
    assert!(px[1] > px[0] && px[1] > px[2], "unexpected color {:?}", px);
}

#[tokio::test]
async fn test_levels_below_min_level_do_not_exist() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "shallow.tif",
        &PyramidBuilder::new(1024, 1024, 256)
            .with_halvings(&[0, 1])
            .build(),
    );
    let service = create_service(dir.path());

    let meta = service.metadata("shallow.tif", &Params::new()).await.unwrap();
    assert_eq!(meta.min_level, 1);
    let err = service
        .get_tile(&TileRequest::new("shallow.tif", 0, 0, 0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "z layer does not exist");
}

// =============================================================================
// Rounded-down levels
// =============================================================================

#[tokio::test]
async fn test_rounded_down_levels_serve_every_tile() {
    let dir = tempfile::tempdir().unwrap();
    // Level 1 is 256 wide, one column short of the 257 pixel level grid
    write_file(
        dir.path(),
        "floor.tif",
        &PyramidBuilder::new(513, 513, 256)
            .with_rounded_down(true)
            .build(),
    );
    let service = create_service(dir.path());

    let meta = service.metadata("floor.tif", &Params::new()).await.unwrap();
    assert_eq!(meta.levels, 3);
    assert_eq!(meta.min_level, 0);
    assert_eq!(meta.tiles_across(1), 2);

    for level in 0..meta.levels {
        for y in 0..meta.tiles_down(level) {
            for x in 0..meta.tiles_across(level) {
                let tile = service
                    .get_tile(&TileRequest::new("floor.tif", level as i64, x as i64, y as i64))
                    .await
                    .unwrap();
                assert!(is_jpeg(&tile.image.data), "tile {}/{}/{}", level, x, y);
            }
        }
    }

    let edge = service
        .get_tile(&TileRequest::new("floor.tif", 1, 1, 0))
        .await
        .unwrap();
    assert_eq!(decoded_size(&edge.image.data), (256, 256));

    let thumb = service.get_thumbnail("floor.tif", &Params::new()).await.unwrap();
    assert_eq!(decoded_size(&thumb.data), (256, 256));

    let region = service
        .get_region(
            "floor.tif",
            &Params::new().with("left", 400).with("top", 400).with("width", 50),
        )
        .await
        .unwrap();
    assert_eq!(decoded_size(&region.data), (50, 50));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_match_sequential() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "shared.tif",
        &PyramidBuilder::new(2048, 1536, 256).build(),
    );
    let service = create_service(dir.path());
    let source = service.source("shared.tif", &Params::new()).await.unwrap();

    let coords: Vec<TileCoord> = (0..8)
        .flat_map(|x| (0..6).map(move |y| TileCoord::new(3, x, y)))
        .collect();
    let regions: Vec<Params> = (0..6)
        .map(|i| {
            Params::new()
                .with("left", i * 300)
                .with("top", i * 200)
                .with("regionWidth", 400)
                .with("regionHeight", 300)
                .with("encoding", "PNG")
        })
        .collect();

    let mut expected_tiles = Vec::new();
    for coord in &coords {
        expected_tiles.push(source.get_tile(*coord, &Params::new()).await.unwrap());
    }
    let mut expected_regions = Vec::new();
    for params in &regions {
        expected_regions.push(source.get_region(params).await.unwrap());
    }

    let mut tasks = JoinSet::new();
    for (i, coord) in coords.iter().copied().enumerate() {
        let source = Arc::clone(&source);
        tasks.spawn(async move { (i, false, source.get_tile(coord, &Params::new()).await) });
    }
    for (i, params) in regions.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        tasks.spawn(async move { (i, true, source.get_region(&params).await) });
    }

    let mut finished = 0;
    while let Some(joined) = tasks.join_next().await {
        let (i, is_region, result) = joined.unwrap();
        let image = result.unwrap();
        if is_region {
            assert_eq!(image, expected_regions[i], "region {}", i);
        } else {
            assert_eq!(image, expected_tiles[i], "tile {:?}", coords[i]);
        }
        finished += 1;
    }
    assert_eq!(finished, coords.len() + regions.len());
}
