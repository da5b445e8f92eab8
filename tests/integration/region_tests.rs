//! Region and thumbnail composition.
//!
//! Tests verify:
//! - Equivalent region descriptions render identically
//! - Negative edges, clamping and empty regions
//! - Output sizing and the thumbnail aspect rule
//! - Parameter errors

use tile_pyramid::{fit_within, Params, RegionRequest};

use super::test_utils::{create_service, decoded_size, is_jpeg, is_png, write_file, PyramidBuilder};

const WIDE_X: u32 = 58368;
const WIDE_Y: u32 = 12288;

fn region_params(pairs: &[(&str, &str)]) -> Params {
    pairs.iter().copied().collect()
}

// =============================================================================
// Region normalization
// =============================================================================

#[test]
fn test_equivalent_region_descriptions() {
    let by_edges = region_params(&[("left", "48000"), ("right", "58368")]);
    let negative = region_params(&[("left", "-10368")]);
    let by_width = region_params(&[("regionWidth", "10368"), ("right", "58368")]);

    let expected = RegionRequest::from_params(&by_edges)
        .unwrap()
        .normalize(WIDE_X, WIDE_Y);
    assert_eq!(expected.left, 48000);
    assert_eq!(expected.width, 10368);
    assert_eq!(expected.top, 0);
    assert_eq!(expected.height, WIDE_Y);

    for params in [negative, by_width] {
        let rect = RegionRequest::from_params(&params)
            .unwrap()
            .normalize(WIDE_X, WIDE_Y);
        assert_eq!(rect, expected, "{:?}", params);
    }

    let fraction = region_params(&[
        ("units", "fraction"),
        ("left", "0.75"),
        ("top", "0.5"),
        ("regionWidth", "0.25"),
    ]);
    let rect = RegionRequest::from_params(&fraction)
        .unwrap()
        .normalize(WIDE_X, WIDE_Y);
    assert_eq!(rect.left, 43776);
    assert_eq!(rect.width, 14592);
    assert_eq!(rect.top, 6144);
    assert_eq!(rect.height, 6144);
}

// =============================================================================
// Regions
// =============================================================================

#[tokio::test]
async fn test_equivalent_regions_render_identically() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "wide.tif",
        &PyramidBuilder::new(WIDE_X, WIDE_Y, 256).build(),
    );
    let service = create_service(dir.path());

    let pixels = region_params(&[
        ("left", "43776"),
        ("top", "6144"),
        ("regionWidth", "14592"),
        ("width", "300"),
        ("encoding", "PNG"),
    ]);
    let fraction = region_params(&[
        ("units", "fraction"),
        ("left", "0.75"),
        ("top", "0.5"),
        ("right", "1"),
        ("width", "300"),
        ("encoding", "PNG"),
    ]);
    let negative = region_params(&[
        ("left", "-14592"),
        ("top", "-6144"),
        ("width", "300"),
        ("encoding", "PNG"),
    ]);

    let a = service.get_region("wide.tif", &pixels).await.unwrap();
    let b = service.get_region("wide.tif", &fraction).await.unwrap();
    let c = service.get_region("wide.tif", &negative).await.unwrap();
    assert!(is_png(&a.data));
    assert_eq!(a.mime_type(), "image/png");
    assert_eq!(decoded_size(&a.data), (300, 126));
    assert_eq!(a.data, b.data);
    assert_eq!(a.data, c.data);
}

#[tokio::test]
async fn test_region_clamped_to_image() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "small.tif", &PyramidBuilder::new(1000, 600, 256).build());
    let service = create_service(dir.path());

    let image = service
        .get_region(
            "small.tif",
            &region_params(&[("left", "800"), ("top", "500"), ("right", "5000"), ("bottom", "5000")]),
        )
        .await
        .unwrap();
    assert!(is_jpeg(&image.data));
    assert_eq!(decoded_size(&image.data), (200, 100));
}

#[tokio::test]
async fn test_empty_region_returns_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "small.tif", &PyramidBuilder::new(1000, 600, 256).build());
    let service = create_service(dir.path());

    for params in [
        region_params(&[("left", "500"), ("right", "500")]),
        region_params(&[("left", "700"), ("right", "300")]),
        region_params(&[("left", "2000")]),
        region_params(&[("regionWidth", "0")]),
    ] {
        let image = service.get_region("small.tif", &params).await.unwrap();
        assert!(image.data.is_empty(), "{:?}", params);
        assert_eq!(image.mime_type(), "image/jpeg");
    }
}

#[tokio::test]
async fn test_region_parameter_errors() {
    let service = create_service(tempfile::tempdir().unwrap().path());
    let base = Params::new().with("maxLevel", 4);

    let cases = [
        (base.clone().with("units", "inches"), "Invalid units \"inches\""),
        (base.clone().with("encoding", "GIF"), "Invalid encoding \"GIF\""),
        (base.clone().with("width", 0), "Invalid width or height"),
        (base.clone().with("height", -5), "Invalid width or height"),
        (
            base.clone().with("left", "abc"),
            "The left parameter is an incorrect type.",
        ),
    ];
    for (params, message) in cases {
        let err = service.get_region("test", &params).await.unwrap_err();
        assert_eq!(err.to_string(), message);
        assert_eq!(err.status_code().as_u16(), 400);
    }
}

// =============================================================================
// Thumbnails
// =============================================================================

#[tokio::test]
async fn test_thumbnail_default_box() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "wide.tif",
        &PyramidBuilder::new(WIDE_X, WIDE_Y, 256).build(),
    );
    let service = create_service(dir.path());

    let thumb = service.get_thumbnail("wide.tif", &Params::new()).await.unwrap();
    assert!(is_jpeg(&thumb.data));
    assert_eq!(decoded_size(&thumb.data), (256, 53));
}

#[tokio::test]
async fn test_thumbnail_aspect_rule() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "small.tif", &PyramidBuilder::new(1000, 600, 256).build());
    let service = create_service(dir.path());

    let cases = [
        (Params::new().with("width", 100), (100, 60)),
        (Params::new().with("height", 100), (166, 100)),
        (Params::new().with("width", 100).with("height", 100), (100, 60)),
        (Params::new().with("width", 500).with("height", 60), (100, 60)),
    ];
    for (params, expected) in cases {
        let thumb = service.get_thumbnail("small.tif", &params).await.unwrap();
        assert_eq!(decoded_size(&thumb.data), expected, "{:?}", params);
        let width = params.get_u32("width").unwrap();
        let height = params.get_u32("height").unwrap();
        assert_eq!(fit_within(1000, 600, width, height), expected);
    }
}

#[tokio::test]
async fn test_thumbnail_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "small.tif", &PyramidBuilder::new(1000, 600, 256).build());
    let service = create_service(dir.path());
    let params = Params::new().with("width", 120).with("encoding", "PNG");

    let first = service.get_thumbnail("small.tif", &params).await.unwrap();
    let second = service.get_thumbnail("small.tif", &params).await.unwrap();
    assert_eq!(first, second);
}
