use crate::registry::PieceRegistry;

#[derive(Clone, Debug)]
pub struct OverflowMonitor {
    limit_y: f32,
    threshold_ms: u64,
    over_limit_ms: u64,
    game_over: bool,
}

impl OverflowMonitor {
    pub fn new(limit_y: f32, threshold_ms: u64) -> Self {
        Self {
            limit_y,
            threshold_ms,
            over_limit_ms: 0,
            game_over: false,
        }
    }

    /// Returns true on the single tick where game over fires.
    pub fn update(&mut self, dt_ms: u64, registry: &PieceRegistry) -> bool {
        if self.game_over {
            return false;
        }

        let overflowing = registry
            .dynamic_pieces()
            .any(|piece| piece.position.y < self.limit_y);

        if !overflowing {
            self.over_limit_ms = 0;
            return false;
        }

        self.over_limit_ms = self.over_limit_ms.saturating_add(dt_ms);
        if self.over_limit_ms >= self.threshold_ms {
            self.game_over = true;
            return true;
        }
        false
    }

    pub fn over_limit_ratio(&self) -> f32 {
        if self.threshold_ms == 0 {
            return if self.game_over { 1.0 } else { 0.0 };
        }
        (self.over_limit_ms as f32 / self.threshold_ms as f32).min(1.0)
    }

    pub fn over_limit_ms(&self) -> u64 {
        self.over_limit_ms
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn reset(&mut self) {
        self.over_limit_ms = 0;
        self.game_over = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Piece;
    use crate::types::Vec2;

    fn registry_with(y: f32, is_static: bool) -> PieceRegistry {
        let mut registry = PieceRegistry::new();
        registry.insert(Piece::new(0, 1, Vec2::new(270.0, y), is_static));
        registry
    }

    #[test]
    fn fires_on_the_tick_that_reaches_threshold() {
        let mut monitor = OverflowMonitor::new(150.0, 3_000);
        let registry = registry_with(120.0, false);

        for tick in 1..=29 {
            assert!(!monitor.update(100, &registry), "fired early at tick {tick}");
        }
        assert_eq!(monitor.over_limit_ms(), 2_900);
        assert!(monitor.update(100, &registry));
        assert!(monitor.is_game_over());

        for _ in 0..10 {
            assert!(!monitor.update(100, &registry));
        }
        assert_eq!(monitor.over_limit_ms(), 3_000);
    }

    #[test]
    fn transient_overflow_resets() {
        let mut monitor = OverflowMonitor::new(150.0, 3_000);
        let above = registry_with(120.0, false);
        let below = registry_with(600.0, false);

        monitor.update(2_999, &above);
        assert!(!monitor.is_game_over());
        assert!(monitor.over_limit_ratio() > 0.99);

        monitor.update(16, &below);
        assert_eq!(monitor.over_limit_ms(), 0);
        assert_eq!(monitor.over_limit_ratio(), 0.0);
        assert!(!monitor.is_game_over());
    }

    #[test]
    fn static_pieces_are_ignored() {
        let mut monitor = OverflowMonitor::new(150.0, 3_000);
        let held = registry_with(100.0, true);
        for _ in 0..100 {
            assert!(!monitor.update(100, &held));
        }
        assert_eq!(monitor.over_limit_ms(), 0);
    }

    #[test]
    fn piece_exactly_on_the_line_is_not_over() {
        let mut monitor = OverflowMonitor::new(150.0, 3_000);
        monitor.update(1_000, &registry_with(150.0, false));
        assert_eq!(monitor.over_limit_ms(), 0);
    }

    #[test]
    fn ratio_is_capped_and_reset_clears_everything() {
        let mut monitor = OverflowMonitor::new(150.0, 3_000);
        let above = registry_with(10.0, false);
        monitor.update(1_500, &above);
        assert_eq!(monitor.over_limit_ratio(), 0.5);
        monitor.update(5_000, &above);
        assert_eq!(monitor.over_limit_ratio(), 1.0);
        assert!(monitor.is_game_over());

        monitor.reset();
        assert!(!monitor.is_game_over());
        assert_eq!(monitor.over_limit_ms(), 0);
    }
}
