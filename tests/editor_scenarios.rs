use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use layerdesk::canvas::Layer;
use layerdesk::ops::adjustments::Adjustments;
use layerdesk::ops::filters::FilterKind;
use layerdesk::ops::transform::TransformKind;
use layerdesk::viewport::CropBox;
use layerdesk::{EditorError, EditorSettings, OpOutcome, Project};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8, 255]))
}

fn write_png(dir: &Path, name: &str, img: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn open(path: &Path) -> Project {
    Project::open(path, &EditorSettings::default()).unwrap()
}

fn layers(project: &Project) -> Vec<Layer> {
    project.canvas().layers.clone()
}

#[test]
fn png_save_and_reload_keeps_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let mut img = gradient(9, 7);
    img.put_pixel(2, 3, Rgba([10, 20, 30, 40]));
    let first = write_png(dir.path(), "first.png", &img);

    let mut project = open(&first);
    let loaded = project.composite().unwrap();
    let second = dir.path().join("second.png");
    project.save(&second).unwrap();
    assert!(!project.unsaved_changes());
    assert_eq!(project.name, "second.png");

    let reloaded = open(&second).composite().unwrap();
    assert_eq!(reloaded, loaded);
    assert_eq!(reloaded, img);
}

#[test]
fn webp_save_and_reload_keeps_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(12, 8));
    let mut project = open(&path);
    let paint = project.add_paint_layer().unwrap();
    project.set_brush_color(RED);
    let _ = project.draw_stroke(paint, None, (6, 4));
    let frame = project.composite().unwrap();

    let webp = dir.path().join("doc.webp");
    project.save(&webp).unwrap();
    assert!(!project.unsaved_changes());
    assert_eq!(open(&webp).composite().unwrap(), frame);
}

#[test]
fn undo_all_then_redo_all() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(24, 16));
    let mut project = open(&path);
    let initial = layers(&project);

    let paint = project.add_paint_layer().unwrap();
    let steps = [
        project.draw_stroke(paint, None, (4, 4)),
        project.draw_stroke(paint, Some((4, 4)), (12, 9)),
        project.apply_filter(0, FilterKind::Blur),
        project.apply_adjustments(0, &Adjustments { contrast: 1.4, ..Adjustments::default() }),
        project.apply_transform(TransformKind::RotateLeft),
        project.apply_crop(CropBox::new(2, 3, 14, 20)),
        project.set_layer_opacity(paint, 0.5),
        project.apply_threshold(0, 100),
    ];
    assert!(steps.iter().all(|s| s.is_applied()));
    let n = steps.len() + 1;
    let final_state = layers(&project);

    for _ in 0..n {
        assert!(project.undo());
    }
    assert!(!project.undo());
    assert_eq!(layers(&project), initial);

    for _ in 0..n {
        assert!(project.redo());
    }
    assert!(!project.redo());
    assert_eq!(layers(&project), final_state);
}

#[test]
fn new_edit_after_undo_prunes_redo() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(8, 8));
    let mut project = open(&path);

    let _ = project.apply_filter(0, FilterKind::Sharpen);
    let _ = project.apply_filter(0, FilterKind::Emboss);
    assert!(project.undo());
    assert!(project.can_redo());
    let _ = project.apply_transform(TransformKind::FlipVertical);
    assert!(!project.can_redo());
    assert!(!project.redo());
    assert_eq!(project.history().entry_count(), 3);
}

#[test]
fn four_left_rotations_are_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(10, 6));
    let mut project = open(&path);
    let idx = project.add_text_layer("Hi", 8.0, RED).unwrap();
    let _ = project.drag_layer(idx, 3, 1);
    let _ = project.end_drag();
    let before = layers(&project);

    for _ in 0..4 {
        assert_eq!(project.apply_transform(TransformKind::RotateLeft), OpOutcome::Applied);
    }
    assert_eq!(layers(&project), before);
}

#[test]
fn crop_shifts_non_base_layers_by_box_origin() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(20, 20));
    let mut project = open(&path);
    let a = project.add_paint_layer().unwrap();
    let b = project.add_text_layer("Hi", 8.0, RED).unwrap();
    let _ = project.drag_layer(b, 5, 6);
    let _ = project.end_drag();
    let before: Vec<(i32, i32)> = project.canvas().layers.iter().map(|l| l.position()).collect();

    assert!(project.apply_crop(CropBox::new(2, 3, 12, 13)).is_applied());
    assert_eq!(project.canvas().size(), Some((10, 10)));
    assert_eq!(project.layer(0).unwrap().position(), before[0]);
    for idx in [a, b] {
        let (x, y) = before[idx];
        assert_eq!(project.layer(idx).unwrap().position(), (x - 2, y - 3));
    }

    assert_eq!(project.apply_crop(CropBox::new(5, 5, 5, 9)), OpOutcome::NoOp);
    assert_eq!(project.apply_crop(CropBox::new(8, 1, 3, 9)), OpOutcome::NoOp);
}

#[test]
fn lone_opaque_layer_composites_to_itself() {
    let dir = tempfile::tempdir().unwrap();
    let img = gradient(13, 5);
    let project = open(&write_png(dir.path(), "doc.png", &img));
    assert_eq!(project.layer_count(), 1);
    assert_eq!(project.composite().unwrap(), project.layer(0).unwrap().pixels);
    assert_eq!(project.composite().unwrap(), img);
}

#[test]
fn brush_dab_paints_red_disk_and_undoes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "blue.png", &RgbaImage::from_pixel(100, 100, BLUE));
    let mut project = open(&path);
    let idx = project.add_paint_layer().unwrap();
    project.set_brush_size(10);
    project.set_brush_color(RED);
    assert!(project.draw_stroke(idx, None, (50, 50)).is_applied());

    let frame = project.composite().unwrap();
    assert_eq!(*frame.get_pixel(50, 50), RED);
    assert_eq!(*frame.get_pixel(55, 50), RED);
    assert_eq!(*frame.get_pixel(50, 45), RED);
    assert_eq!(*frame.get_pixel(56, 50), BLUE);
    assert_eq!(*frame.get_pixel(54, 54), BLUE);

    assert!(project.undo());
    assert_eq!(project.layer_count(), 2);
    assert_eq!(*project.composite().unwrap().get_pixel(50, 50), BLUE);
    assert!(project.redo());
    assert_eq!(project.composite().unwrap(), frame);
}

#[test]
fn text_with_missing_font_still_renders() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(200, 100));
    let mut project = open(&path);
    project.set_text_font_family("Definitely Not Installed 4b1d");
    let idx = project.add_text_layer("Hi", 48.0, Rgba([0, 0, 0, 255])).unwrap();
    let layer = project.layer(idx).unwrap();
    assert!(layer.width() > 0 && layer.height() > 0);
    assert_eq!(layer.position(), (0, 0));
    assert!(layer.name.starts_with("Text: \"Hi"));
}

#[test]
fn layered_project_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(30, 20));
    let mut project = open(&path);
    let paint = project.add_paint_layer().unwrap();
    let _ = project.draw_stroke(paint, None, (10, 10));
    let _ = project.set_layer_opacity(paint, 0.25);
    let text = project.add_text_layer("Hello", 16.0, RED).unwrap();
    let _ = project.drag_layer(text, -4, 7);
    let _ = project.end_drag();
    let _ = project.set_layer_visible(text, false);

    let ldp = dir.path().join("doc.ldp");
    project.save(&ldp).unwrap();
    let reopened = open(&ldp);
    assert_eq!(layers(&reopened), layers(&project));
    assert_eq!(reopened.history().entry_count(), 1);
    assert!(!reopened.can_undo());
}

#[test]
fn display_drag_becomes_image_crop() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "doc.png", &gradient(40, 20));
    let mut project = open(&path);
    // 40×20 shown in 80×80: scale 2, letterboxed 20px top and bottom.
    let fit = project.fit_transform(80, 80).unwrap();
    assert_eq!(fit.to_image_coords(10.0, 5.0), None);
    assert_eq!(fit.to_image_coords(10.0, 30.0), Some((5, 5)));

    let crop = fit.crop_box_from_display(60.0, 50.0, 10.0, 30.0).unwrap();
    assert_eq!(crop, CropBox::new(5, 5, 30, 15));
    assert!(project.apply_crop(crop).is_applied());
    assert_eq!(project.canvas().size(), Some((25, 10)));
}

#[test]
fn failures_surface_as_errors() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"not an image").unwrap();
    assert!(matches!(
        Project::open(&bogus, &EditorSettings::default()),
        Err(EditorError::Decode { .. })
    ));

    let path = write_png(dir.path(), "doc.png", &gradient(4, 4));
    let mut project = open(&path);
    assert!(matches!(project.add_image_layer(&bogus), Err(EditorError::Decode { .. })));
    assert_eq!(project.history().entry_count(), 1);
    let missing_dir = dir.path().join("nope").join("out.png");
    assert!(matches!(project.save(&missing_dir), Err(EditorError::Encode { .. })));
}

#[test]
fn image_layers_stack_on_top() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_png(dir.path(), "base.png", &RgbaImage::from_pixel(6, 6, BLUE));
    let overlay = write_png(dir.path(), "dot.png", &RgbaImage::from_pixel(2, 2, RED));
    let mut project = open(&base);
    let idx = project.add_image_layer(&overlay).unwrap();
    assert_eq!(project.layer(idx).unwrap().name, "dot.png");
    let frame = project.composite().unwrap();
    assert_eq!(*frame.get_pixel(1, 1), RED);
    assert_eq!(*frame.get_pixel(2, 2), BLUE);
    assert!(project.unsaved_changes());
    assert_eq!(project.display_title(), "base.png*");
}
