//! Tests for the texture cache: MIPMAP derivation, wrap modes, level
//! selection, environment lookups and the memory budget.

#[path = "test_utils.rs"]
mod test_utils;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Result;
use catclark::context::{OptionTable, OptionValue, RenderContext};
use catclark::texture::{Filter, SampleOptions, WrapMode};
use glam::Vec3;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use test_utils::temp_path;

/// Write an 8-bit single-channel scanline TIFF.
fn write_gray8(path: &Path, width: u32, height: u32, value: impl Fn(u32, u32) -> u8) -> Result<()> {
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(value(x, y));
        }
    }
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file)?;
    encoder.write_image::<colortype::Gray8>(width, height, &data)?;
    Ok(())
}

/// A 256x256 checkerboard with 128-texel blocks.
fn checkerboard(path: &Path) -> Result<()> {
    write_gray8(path, 256, 256, |x, y| {
        if (x / 128 + y / 128) % 2 == 0 {
            0
        } else {
            255
        }
    })
}

fn centre_only() -> SampleOptions {
    SampleOptions {
        samples: 0,
        ..SampleOptions::default()
    }
}

#[test]
fn checkerboard_level_selection() -> Result<()> {
    let path = temp_path("checker.tif");
    checkerboard(&path)?;
    let name = path.display().to_string();

    let mut context = RenderContext::new();
    let mut out = Vec::new();

    // A texel-sized footprint samples level 0.
    context.sample_texture(&name, 0.25, 0.25, 1.0 / 256.0, 1.0 / 256.0, &centre_only(), &mut out);
    assert_eq!(out.len(), 1);
    assert!(out[0].abs() < 1.0, "expected black texel, got {}", out[0]);

    context.sample_texture(&name, 0.75, 0.25, 1.0 / 256.0, 1.0 / 256.0, &centre_only(), &mut out);
    assert!((out[0] - 255.0).abs() < 1.0, "expected white texel, got {}", out[0]);

    // The whole image as footprint reads the top of the pyramid:
    // half black, half white.
    context.sample_texture(&name, 0.5, 0.5, 1.0, 1.0, &centre_only(), &mut out);
    assert!(
        (out[0] - 127.5).abs() < 1.5,
        "expected mid grey, got {}",
        out[0]
    );
    Ok(())
}

#[test]
fn mip_levels_halve_and_average() -> Result<()> {
    let path = temp_path("gradient.tif");
    // A horizontal ramp, 16 wide.
    write_gray8(&path, 16, 16, |x, _| (x * 16) as u8)?;

    let out_path = temp_path("gradient.tex");
    let mut context = RenderContext::new();
    context.make_texture(
        &path,
        &out_path,
        WrapMode::Clamp,
        WrapMode::Clamp,
        Filter::Box,
        1.0,
        1.0,
    )?;

    // Decode the written pyramid: 16, 8 and 4 wide directories.
    let mut decoder = Decoder::new(BufReader::new(File::open(&out_path)?))?;
    let mut dimensions = vec![decoder.dimensions()?];
    let DecodingResult::F32(level0) = decoder.read_image()? else {
        panic!("levels are written as f32");
    };
    let mut levels = vec![level0];
    while decoder.more_images() {
        decoder.next_image()?;
        dimensions.push(decoder.dimensions()?);
        let DecodingResult::F32(data) = decoder.read_image()? else {
            panic!("levels are written as f32");
        };
        levels.push(data);
    }
    assert_eq!(dimensions, vec![(16, 16), (8, 8), (4, 4)]);

    // Box downsampling makes each texel the mean of its four parents.
    let parent = &levels[0];
    let child = &levels[1];
    for y in 0..8usize {
        for x in 0..8usize {
            let mean = (parent[2 * y * 16 + 2 * x]
                + parent[2 * y * 16 + 2 * x + 1]
                + parent[(2 * y + 1) * 16 + 2 * x]
                + parent[(2 * y + 1) * 16 + 2 * x + 1])
                / 4.0;
            assert!((child[y * 8 + x] - mean).abs() < 1e-4);
        }
    }

    // The format tag marks the file as a MIPMAP.
    decoder.seek_to_image(0)?;
    match decoder.find_tag(Tag::Unknown(33302))? {
        Some(tiff::decoder::ifd::Value::Ascii(s)) => assert_eq!(s, "MIP Map"),
        other => panic!("missing textureformat tag: {:?}", other),
    }
    Ok(())
}

#[test]
fn periodic_wrap_repeats() -> Result<()> {
    let source = temp_path("wrap_src.tif");
    write_gray8(&source, 64, 64, |x, _| if x < 32 { 10 } else { 200 })?;
    let output = temp_path("wrap_periodic.tex");

    let mut context = RenderContext::new();
    context.make_texture(
        &source,
        &output,
        WrapMode::Periodic,
        WrapMode::Periodic,
        Filter::Box,
        1.0,
        1.0,
    )?;
    let name = output.display().to_string();

    let mut inside = Vec::new();
    let mut wrapped = Vec::new();
    let footprint = 1.0 / 64.0;
    context.sample_texture(&name, 0.2, 0.5, footprint, footprint, &centre_only(), &mut inside);
    context.sample_texture(&name, 2.2, 0.5, footprint, footprint, &centre_only(), &mut wrapped);
    assert!((inside[0] - wrapped[0]).abs() < 1e-3);
    Ok(())
}

#[test]
fn black_wrap_returns_zero_outside() -> Result<()> {
    let source = temp_path("black_src.tif");
    write_gray8(&source, 64, 64, |_, _| 200)?;
    let output = temp_path("wrap_black.tex");

    let mut context = RenderContext::new();
    context.make_texture(
        &source,
        &output,
        WrapMode::Black,
        WrapMode::Black,
        Filter::Box,
        1.0,
        1.0,
    )?;
    let name = output.display().to_string();

    let mut out = Vec::new();
    let footprint = 1.0 / 64.0;
    context.sample_texture(&name, -0.1, 0.5, footprint, footprint, &centre_only(), &mut out);
    assert_eq!(out, vec![0.0]);

    context.sample_texture(&name, 0.5, 0.5, footprint, footprint, &centre_only(), &mut out);
    assert!((out[0] - 200.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn environment_cube_dispatches_by_axis() -> Result<()> {
    // A 3x2 atlas of 32x32 faces, one constant value per face in the
    // order +x -x +y -y +z -z.
    let path = temp_path("environment.tif");
    let face_values = [10.0f32, 20.0, 30.0, 40.0, 50.0, 60.0];
    let mut data = vec![0.0f32; 96 * 64];
    for (face, &value) in face_values.iter().enumerate() {
        let (cell_x, cell_y) = ([0, 0, 1, 1, 2, 2][face], [0, 1, 0, 1, 0, 1][face]);
        for y in 0..32 {
            for x in 0..32 {
                data[(cell_y * 32 + y) * 96 + cell_x * 32 + x] = value;
            }
        }
    }
    {
        let file = File::create(&path)?;
        let mut encoder = TiffEncoder::new(file)?;
        let mut image = encoder.new_image::<colortype::Gray32Float>(96, 64)?;
        image
            .encoder()
            .write_tag(Tag::Unknown(33302), "CubeFace Environment")?;
        image
            .encoder()
            .write_tag(Tag::Unknown(33303), "clamp clamp box 1.0 1.0")?;
        image.write_data(&data)?;
    }
    let name = path.display().to_string();

    let mut context = RenderContext::new();
    let options = SampleOptions {
        samples: 1,
        ..SampleOptions::default()
    };
    let mut out = Vec::new();

    let cases = [
        (Vec3::X, 10.0),
        (Vec3::NEG_X, 20.0),
        (Vec3::Y, 30.0),
        (Vec3::NEG_Y, 40.0),
        (Vec3::Z, 50.0),
        (Vec3::NEG_Z, 60.0),
    ];
    for (direction, expected) in cases {
        context.sample_environment(&name, [direction; 4], &options, &mut out);
        assert!(
            (out[0] - expected).abs() < 0.5,
            "direction {:?} sampled {} instead of {}",
            direction,
            out[0],
            expected
        );
    }
    Ok(())
}

#[test]
fn budget_overrun_warns_and_continues() -> Result<()> {
    let path = temp_path("budget.tif");
    checkerboard(&path)?;
    let name = path.display().to_string();

    // One KiB of budget cannot hold a 256x256 float image; sampling
    // must still work, over budget.
    let mut options = OptionTable::new();
    options.set("limits", "texturememory", OptionValue::Integer(vec![1]));
    let mut context = RenderContext::with_options(options);

    let mut out = Vec::new();
    context.sample_texture(&name, 0.25, 0.25, 1.0 / 256.0, 1.0 / 256.0, &centre_only(), &mut out);
    assert_eq!(out.len(), 1);
    assert!(context.stats().texture_memory() > 1024);
    Ok(())
}

#[test]
fn missing_texture_samples_zero() {
    let mut context = RenderContext::new();
    let mut out = Vec::new();
    context.sample_texture(
        "/nonexistent/texture.tif",
        0.5,
        0.5,
        0.01,
        0.01,
        &centre_only(),
        &mut out,
    );
    assert!(out.iter().all(|&v| v == 0.0));
}
