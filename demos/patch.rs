use skyshot::image::{Hot, Image, Window, render_heatmap};
use std::fs;

fn main() {
    // A faint Gaussian spot centered on pixel (12, 17).
    let image = Image::from_fn(25, 35, |row, col| {
        let (dy, dx) = (row as f64 - 12.0, col as f64 - 17.0);
        1e-9 * (-(dx * dx + dy * dy) / 2.0).exp()
    });

    let window = Window::square(12, 17, 2);
    let patch = image.patch(window).expect("window lies inside the image");
    println!("{patch}");
    dbg!(patch.center());

    // Windows that spill over the edge are skipped by the lenient accessor.
    assert!(image.get_patch(Window::square(1, 17, 2)).is_none());

    let png = render_heatmap(&patch, &Hot, 40).expect("failed to encode heatmap");
    fs::write("patch_heatmap.png", png).expect("failed to write heatmap");

    patch
        .append_report("patch_extract.txt")
        .expect("failed to append report");

    // Lift the faint spot into a visible range before saving.
    image
        .scaled(1e9)
        .save_gray8("spot.png")
        .expect("failed to save image");
}
