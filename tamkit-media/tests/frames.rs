use tamkit_media::{Image, VideoFrames, RGB};

#[test]
fn frame_directory_loads_in_name_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for (index, shade) in [(2u8, 20u8), (0, 0), (1, 10)] {
        let mut frame = Image::from_raw((6, 4), vec![0; 6 * 4 * 3])?;
        frame.as_rgb_mut().put_pixel(0, 0, RGB(shade, shade, shade).into());
        frame.save(dir.path().join(format!("{index:05}.png")))?;
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame")?;

    let video = VideoFrames::open(dir.path())?;

    assert_eq!(video.len(), 3);
    assert_eq!(video.get_size(), Some((6, 4)));
    assert_eq!(video.fps(), 30.0);
    let shades = video
        .frames()
        .iter()
        .map(|frame| frame.as_rgb().get_pixel(0, 0).0[0])
        .collect::<Vec<_>>();
    assert_eq!(shades, vec![0, 10, 20]);
    Ok(())
}

#[test]
fn empty_frame_directory_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(VideoFrames::open(dir.path()).is_err());
    Ok(())
}

#[test]
fn frames_of_different_sizes_are_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    Image::from_raw((4, 4), vec![0; 48])?.save(dir.path().join("a.png"))?;
    Image::from_raw((2, 2), vec![0; 12])?.save(dir.path().join("b.png"))?;

    assert!(VideoFrames::open(dir.path()).is_err());
    Ok(())
}
