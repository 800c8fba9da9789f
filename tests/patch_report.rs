use skyshot::image::{FILE_PRECISION, Image, Window};
use skyshot::prelude::Error;

fn spot() -> Image {
    Image::from_fn(5, 5, |row, col| if (row, col) == (2, 2) { 1.0 } else { 0.0 })
}

#[test]
fn center_value_round_trips() {
    let image = Image::from_fn(10, 12, |row, col| (row as f64).sin() * (col as f64).cos());

    for (row, col) in [(1, 1), (4, 7), (8, 10)] {
        let patch = image.patch(Window::square(row, col, 1)).unwrap();
        assert_eq!(patch.center(), image.get(row, col).unwrap());
    }
}

#[test]
fn spot_patch() {
    let image = spot();
    let patch = image.patch(Window::square(2, 2, 1)).unwrap();

    assert_eq!((patch.rows(), patch.cols()), (3, 3));
    assert_eq!(patch.center(), 1.0);
    for row in 0..3 {
        for col in 0..3 {
            let expected = if (row, col) == (1, 1) { 1.0 } else { 0.0 };
            assert_eq!(patch.get(row, col), Some(expected));
        }
    }
}

#[test]
fn top_edge_out_of_bounds() {
    let image = Image::zeros(10, 10);
    let window = Window::new(0, 5, 1, 1);

    assert!(image.get_patch(window).is_none());
    assert!(matches!(image.patch(window), Err(Error::BoundsExceeded { .. })));
}

#[test]
fn console_report() {
    let image = spot();
    let report = image.patch(Window::square(2, 2, 1)).unwrap().to_string();
    insta::assert_snapshot!(report);
}

#[test]
fn file_report_has_full_precision() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extract.txt");

    let image = Image::from_fn(3, 3, |_, _| 1.0 / 3.0);
    image
        .patch(Window::square(1, 1, 1))
        .unwrap()
        .append_report(&path)
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("# generated_at="));
    assert_eq!(lines.next(), Some("Extract :"));

    let cell = format!("{:.*}", FILE_PRECISION, 1.0 / 3.0);
    assert_eq!(
        lines.next(),
        Some(format!("  line   0 :  {cell}   {cell}   {cell}").as_str())
    );
    assert_eq!(
        lines.next(),
        Some(format!("  line   1 :  {cell}  [{cell}]  {cell}").as_str())
    );
}
