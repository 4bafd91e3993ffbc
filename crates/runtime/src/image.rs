//! Raw capture artifacts.
//!
//! Captures are stored as binary 8-bit greyscale PGM (`P5`), the format
//! scanner tooling has long used for raw fingerprint images.

use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes `pixels` (row-major, one byte per pixel) as a binary PGM file.
pub fn write_pgm(path: &Path, width: u32, height: u32, pixels: &[u8]) -> std::io::Result<()> {
	let expected = width as usize * height as usize;
	if pixels.len() != expected {
		return Err(std::io::Error::new(
			std::io::ErrorKind::InvalidInput,
			format!("expected {expected} pixels for {width}x{height}, got {}", pixels.len()),
		));
	}

	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() && !parent.exists() {
			fs::create_dir_all(parent)?;
		}
	}

	let mut file = fs::File::create(path)?;
	write!(file, "P5\n{width} {height}\n255\n")?;
	file.write_all(pixels)?;
	file.flush()
}

/// Renders a ridge-like test pattern for `finger`, or flat noise for a rejected sample.
pub fn synthetic_print(finger: Option<u32>, width: u32, height: u32) -> Vec<u8> {
	let Some(finger) = finger else {
		return vec![128; width as usize * height as usize];
	};

	let spacing = 3.0 + (finger % 4) as f32;
	let cx = width as f32 / 2.0 + (finger % 7) as f32;
	let cy = height as f32 / 2.0;

	let mut pixels = Vec::with_capacity(width as usize * height as usize);
	for y in 0..height {
		for x in 0..width {
			let dx = x as f32 - cx;
			let dy = (y as f32 - cy) * 0.8;
			let ring = ((dx * dx + dy * dy).sqrt() / spacing) as u32;
			pixels.push(if ring % 2 == 0 { 40 } else { 215 });
		}
	}
	pixels
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pixel_count_must_match_dimensions() {
		let dir = tempfile::tempdir().unwrap();
		let err = write_pgm(&dir.path().join("bad.pgm"), 4, 4, &[0; 3]).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
	}

	#[test]
	fn creates_missing_parent_directories() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("captures").join("identify.pgm");
		write_pgm(&path, 2, 1, &[0, 255]).unwrap();
		assert_eq!(std::fs::read(path).unwrap(), b"P5\n2 1\n255\n\x00\xff");
	}

	#[test]
	fn different_fingers_render_differently() {
		assert_ne!(synthetic_print(Some(1), 16, 16), synthetic_print(Some(2), 16, 16));
		assert!(synthetic_print(None, 4, 4).iter().all(|p| *p == 128));
	}
}
