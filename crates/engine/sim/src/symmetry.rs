//! Mirror orientation chosen per rule attempt

use glam::IVec2;
use rand::Rng;
use script::{Rule, Symmetry};

/// Which axes a rule attempt is mirrored on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Orientation {
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Orientation {
    pub const IDENTITY: Self = Self {
        flip_x: false,
        flip_y: false,
    };

    /// Independent coin flip for every declared axis
    pub fn random<R: Rng + ?Sized>(symmetry: Symmetry, rng: &mut R) -> Self {
        Self {
            flip_x: symmetry.x && rng.random_bool(0.5),
            flip_y: symmetry.y && rng.random_bool(0.5),
        }
    }

    fn signs(&self) -> IVec2 {
        IVec2::new(
            if self.flip_x { -1 } else { 1 },
            if self.flip_y { -1 } else { 1 },
        )
    }

    /// Map an anchor-relative offset into grid space
    pub fn apply(&self, offset: IVec2) -> IVec2 {
        offset * self.signs()
    }

    /// Grid position of the top-left corner of the rule box
    pub fn box_origin(&self, rule: &Rule, target: IVec2) -> IVec2 {
        let size = rule.size();
        let anchor = IVec2::new(
            if self.flip_x { size.x - 1 - rule.anchor.x } else { rule.anchor.x },
            if self.flip_y { size.y - 1 - rule.anchor.y } else { rule.anchor.y },
        );
        target - anchor
    }

    /// Pattern coordinate read for box cell `(col, row)`
    pub fn pattern_coord(&self, rule: &Rule, col: usize, row: usize) -> (usize, usize) {
        let col = if self.flip_x { rule.width as usize - 1 - col } else { col };
        let row = if self.flip_y { rule.height as usize - 1 - row } else { row };
        (col, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rule() -> Rule {
        Rule::new(0, 3, 2, IVec2::new(0, 1))
    }

    #[test]
    fn test_identity() {
        let o = Orientation::IDENTITY;
        assert_eq!(o.apply(IVec2::new(2, -1)), IVec2::new(2, -1));
        assert_eq!(o.box_origin(&rule(), IVec2::new(10, 10)), IVec2::new(10, 9));
        assert_eq!(o.pattern_coord(&rule(), 0, 1), (0, 1));
    }

    #[test]
    fn test_mirrored_box_keeps_anchor_on_target() {
        let rule = rule();
        let o = Orientation {
            flip_x: true,
            flip_y: false,
        };
        let origin = o.box_origin(&rule, IVec2::new(10, 10));
        assert_eq!(origin, IVec2::new(8, 9));
        // the box cell holding the target reads the anchor's pattern slot
        let target_col = (10 - origin.x) as usize;
        let target_row = (10 - origin.y) as usize;
        assert_eq!(o.pattern_coord(&rule, target_col, target_row), (0, 1));
        // an offset two to the right lands two to the left
        assert_eq!(o.apply(IVec2::new(2, 0)), IVec2::new(-2, 0));
    }

    #[test]
    fn test_random_respects_declared_axes() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let o = Orientation::random(Symmetry { x: true, y: false }, &mut rng);
            assert!(!o.flip_y);
        }
        let flips = (0..200)
            .filter(|_| Orientation::random(Symmetry { x: true, y: true }, &mut rng).flip_x)
            .count();
        assert!(flips > 50 && flips < 150);
    }
}
