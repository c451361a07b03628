use std::path::Path;

use scanbind::flags::{DocumentFlags, OutlineNode};
use scanbind::maker::djvu::{
    DjvuBackend, DjvuToolchain, djvused_script, outline_sexpr, pnm_bytes, quality_to_decibel,
};
use scanbind::source::RasterImage;

#[test]
fn quality_maps_onto_decibel_range() {
    assert_eq!(quality_to_decibel(0), 16.0);
    assert_eq!(quality_to_decibel(50), 32.0);
    assert_eq!(quality_to_decibel(100), 48.0);
    // Out-of-range input saturates.
    assert_eq!(quality_to_decibel(255), 48.0);
}

#[test]
fn bilevel_pnm_is_bitpacked_pbm() {
    // 5 pixels wide: one padded byte per row, MSB first, 1 = black.
    let raster = RasterImage::new(5, 2, 1, vec![
        0, 255, 0, 255, 0, //
        255, 255, 255, 255, 255,
    ]);
    let bytes = pnm_bytes(&raster, true);
    assert!(bytes.starts_with(b"P4\n5 2\n"));
    let data = &bytes[b"P4\n5 2\n".len()..];
    assert_eq!(data, &[0b1010_1000, 0b0000_0000]);
}

#[test]
fn gray_and_rgb_pnm_headers() {
    let gray = RasterImage::new(2, 2, 1, vec![1, 2, 3, 4]);
    let bytes = pnm_bytes(&gray, false);
    assert!(bytes.starts_with(b"P5\n2 2\n255\n"));
    assert!(bytes.ends_with(&[1, 2, 3, 4]));

    let rgb = RasterImage::new(1, 1, 3, vec![9, 8, 7]);
    let bytes = pnm_bytes(&rgb, false);
    assert!(bytes.starts_with(b"P6\n1 1\n255\n"));
    assert!(bytes.ends_with(&[9, 8, 7]));
}

#[test]
fn script_selects_one_based_pages_and_escapes_titles() {
    let titles = vec![
        Some("Cover".to_string()),
        None,
        Some("He said \"hi\"".to_string()),
    ];
    let script = djvused_script(&titles, None);
    assert_eq!(
        script,
        "select 1; set-page-title \"Cover\"\n\
         select 3; set-page-title \"He said \\\"hi\\\"\"\n\
         save\n"
    );
}

#[test]
fn script_references_outline_file() {
    let script = djvused_script(&[None], Some(Path::new("/tmp/work/outline.sexp")));
    assert!(script.contains("set-outline \"/tmp/work/outline.sexp\""));
    assert!(script.ends_with("save\n"));
}

#[test]
fn outline_path_with_quote_is_escaped() {
    let script = djvused_script(&[None], Some(Path::new("/tmp/o'brien/outline.sexp")));
    assert!(script.contains("set-outline \"/tmp/o'brien/outline.sexp\""));

    let script = djvused_script(&[None], Some(Path::new("/tmp/wo\"rk/outline.sexp")));
    assert!(script.contains("set-outline \"/tmp/wo\\\"rk/outline.sexp\""));
}

#[test]
fn control_characters_in_titles_become_octal_escapes() {
    let titles = vec![Some("Line\nbreak\tand\rmore".to_string())];
    let script = djvused_script(&titles, None);
    // A raw newline would terminate the script statement early.
    assert_eq!(
        script,
        "select 1; set-page-title \"Line\\012break\\011and\\015more\"\nsave\n"
    );
}

#[test]
fn outline_sexpr_uses_one_based_page_targets() {
    let root = OutlineNode {
        text: None,
        page: 0,
        children: vec![OutlineNode {
            text: Some("Chapter 1".into()),
            page: 0,
            children: vec![OutlineNode {
                text: Some("Section 1.1".into()),
                page: 3,
                children: Vec::new(),
            }],
        }],
    };
    let sexpr = outline_sexpr(&root);
    assert!(sexpr.starts_with("(bookmarks"));
    assert!(sexpr.contains("(\"Chapter 1\" \"#1\""));
    assert!(sexpr.contains("(\"Section 1.1\" \"#4\")"));
}

#[test]
fn textless_nodes_are_pure_containers() {
    // A container in the middle of the tree splices its children into the
    // parent level instead of emitting an entry.
    let root = OutlineNode {
        text: None,
        page: 0,
        children: vec![OutlineNode {
            text: None,
            page: 0,
            children: vec![
                OutlineNode {
                    text: Some("A".into()),
                    page: 0,
                    children: Vec::new(),
                },
                OutlineNode {
                    text: Some("B".into()),
                    page: 1,
                    children: Vec::new(),
                },
            ],
        }],
    };
    let sexpr = outline_sexpr(&root);
    assert!(sexpr.contains("(\"A\" \"#1\")"));
    assert!(sexpr.contains("(\"B\" \"#2\")"));
    // No empty-titled entry leaks into the output.
    assert!(!sexpr.contains("\"\""));
}

#[test]
fn backend_owns_a_temp_dir_and_removes_it_on_drop() {
    let base = tempfile::tempdir().expect("create temp dir");
    let flags = DocumentFlags {
        temp_dir: Some(base.path().to_path_buf()),
        ..DocumentFlags::default()
    };
    let output = base.path().join("out.djvu");

    let temp_dir = {
        let backend = DjvuBackend::new(&output, &flags, DjvuToolchain::default())
            .expect("backend creation");
        let temp_dir = backend.temp_dir().to_path_buf();
        assert!(temp_dir.is_dir());
        assert!(temp_dir.starts_with(base.path()));

        // The seed page's artifact is the output document itself.
        assert_eq!(backend.page_path(0), output);
        assert_eq!(
            backend.page_path(3),
            temp_dir.join("page_000003.djvu")
        );
        temp_dir
    };
    assert!(!temp_dir.exists(), "temp dir removed on drop");
}
