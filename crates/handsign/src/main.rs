//! Classifies a hand contour read from a file.
//!
//! Usage: `handsign <contour-file> [hull-area] [max-defects]`
//!
//! The contour file contains one `x y` (or `x,y`) point per line, in pixels. Empty lines and lines
//! starting with `#` are ignored. If no hull area is given, the contour's convex hull is used.

use std::{env, fs, process};

use anyhow::{bail, Context};
use handsign::{
    geometry::{convex_hull_area, max_defects_hint, Contour, Point},
    gesture::classify,
};

fn parse_contour(text: &str) -> anyhow::Result<Contour> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(lineno, line)| -> anyhow::Result<Point> {
            let coords = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("line {lineno}: invalid coordinate in '{line}'"))?;
            match coords[..] {
                [x, y] => Ok(Point::new(x, y)),
                _ => bail!("line {lineno}: expected 2 coordinates, got {}", coords.len()),
            }
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let path = match args.first() {
        Some(path) => path,
        None => {
            eprintln!("usage: handsign <contour-file> [hull-area] [max-defects]");
            process::exit(1);
        }
    };

    let text = fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?;
    let contour = parse_contour(&text).with_context(|| format!("failed to parse '{path}'"))?;

    let hull_area = match args.get(1) {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("invalid hull area '{arg}'"))?,
        None => convex_hull_area(contour.points()),
    };
    let max_defects = match args.get(2) {
        Some(arg) => arg
            .parse::<usize>()
            .with_context(|| format!("invalid defect limit '{arg}'"))?,
        None => max_defects_hint(&contour),
    };

    log::debug!(
        "{} points, area {:.1}, hull area {hull_area:.1}, max defects {max_defects}",
        contour.len(),
        contour.area(),
    );
    let gesture = classify(&contour, hull_area, max_defects)?;
    println!("{gesture}");

    Ok(())
}
