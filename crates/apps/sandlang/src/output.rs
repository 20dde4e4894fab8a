//! Text and image output for finished runs

use std::fmt::Write as _;
use std::path::Path;

use glam::IVec2;
use image::{ImageBuffer, Rgb};
use rand::Rng;
use script::{AtomColor, WorldDefinition};
use sim::{GridView, RenderView, Snapshot};

/// One line per atom type: id, name, alias, key, rule counts
pub fn summary(world: &WorldDefinition) -> String {
    let mut out = String::new();
    for atom in world.atoms() {
        let color = match atom.color {
            AtomColor::Fixed(c) => format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b),
            AtomColor::Dynamic => format!("dynamic({})", atom.color_rules.len()),
        };
        let _ = writeln!(
            out,
            "{:>3} {:<12} alias={:<6} key={} color={} rules={} always={} ext={}",
            atom.id,
            atom.name,
            atom.alias.as_deref().unwrap_or("-"),
            atom.key.map(String::from).unwrap_or_else(|| "-".into()),
            color,
            atom.rules.len(),
            atom.always_rules.len(),
            atom.extensions.len()
        );
    }
    let _ = writeln!(
        out,
        "{} atoms, {} rules, empty = {}",
        world.len(),
        world.rule_count(),
        world.atom(world.empty()).name
    );
    out
}

/// `Name=count` for every type present, most common first
pub fn population_line(world: &WorldDefinition, snapshot: &Snapshot) -> String {
    let mut counts: Vec<(usize, &str)> = snapshot
        .population()
        .into_iter()
        .enumerate()
        .filter(|(_, count)| *count > 0)
        .filter_map(|(id, count)| world.get(id as u16).map(|atom| (count, atom.name.as_str())))
        .collect();
    counts.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
    counts
        .iter()
        .map(|(count, name)| format!("{name}={count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn glyph(world: &WorldDefinition, atom: u16) -> char {
    if atom == world.empty() {
        return '.';
    }
    let Some(kind) = world.get(atom) else {
        return '?';
    };
    kind.key
        .or_else(|| kind.name.chars().next())
        .unwrap_or('#')
}

/// The grid as text, one character per cell
pub fn dump(world: &WorldDefinition, snapshot: &Snapshot) -> String {
    let size = snapshot.size();
    let mut out = String::with_capacity(((size.x + 1) * size.y) as usize);
    for y in 0..size.y {
        for x in 0..size.x {
            let atom = snapshot.atom_at(IVec2::new(x, y)).unwrap_or(world.empty());
            out.push(glyph(world, atom));
        }
        out.push('\n');
    }
    out
}

/// Render the snapshot with the script's colors; undrawn cells are black
pub fn render_image<R: Rng + ?Sized>(
    world: &WorldDefinition,
    snapshot: &Snapshot,
    rng: &mut R,
) -> sim::Result<ImageBuffer<Rgb<u8>, Vec<u8>>> {
    let size = snapshot.size();
    let view = RenderView::new(world, snapshot);
    let mut buffer = ImageBuffer::new(size.x.max(0) as u32, size.y.max(0) as u32);
    for (position, _) in snapshot.cells() {
        if !view.should_draw(position) {
            continue;
        }
        let color = view.resolve_color(position, rng)?;
        buffer.put_pixel(
            position.x as u32,
            position.y as u32,
            Rgb([color.r, color.g, color.b]),
        );
    }
    Ok(buffer)
}

pub fn save_png<R: Rng + ?Sized>(
    world: &WorldDefinition,
    snapshot: &Snapshot,
    path: &Path,
    rng: &mut R,
) -> anyhow::Result<()> {
    let buffer = render_image(world, snapshot, rng)?;
    buffer.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sim::{Cell, GridViewMut};

    const WORLD: &str = "atom Empty {\n}\natom Sand {\n section property {\n def key s\n def color #FF0000\n cdef render 1\n }\n}\natom Stone {\n}\n";

    fn snapshot(world: &WorldDefinition) -> Snapshot {
        let mut snapshot = Snapshot::new(IVec2::new(3, 2));
        let sand = world.atom_by_name("Sand").unwrap();
        *snapshot.cell_mut(IVec2::new(1, 0)).unwrap() = Cell::new(sand.id, sand.properties.clone());
        *snapshot.cell_mut(IVec2::new(2, 1)).unwrap() = Cell::new(2, Default::default());
        *snapshot.cell_mut(IVec2::new(0, 1)).unwrap() = Cell::new(sand.id, Default::default());
        snapshot
    }

    #[test]
    fn test_dump_and_population() {
        let world = script::compile(WORLD).unwrap();
        let snapshot = snapshot(&world);
        assert_eq!(dump(&world, &snapshot), ".s.\ns.S\n");
        assert_eq!(population_line(&world, &snapshot), "Empty=3 Sand=2 Stone=1");
    }

    #[test]
    fn test_render_image_skips_undrawn_types() {
        let world = script::compile(WORLD).unwrap();
        let snapshot = snapshot(&world);
        let mut rng = StdRng::seed_from_u64(1);
        let image = render_image(&world, &snapshot, &mut rng).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 0), &Rgb([255, 0, 0]));
        // Stone has no render constant
        assert_eq!(image.get_pixel(2, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_sandbox_script_summary() {
        let world = script::compile(include_str!("../scripts/sandbox.sand")).unwrap();
        let text = summary(&world);
        assert!(text.contains("Fire"));
        assert!(text.contains("dynamic(3)"));
        assert!(text.ends_with("empty = Empty\n"));
    }
}
