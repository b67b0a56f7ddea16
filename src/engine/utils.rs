use std::time::{SystemTime, UNIX_EPOCH};

use crate::physics::BodyId;

pub(super) fn now_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    now as u64
}

pub(super) fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(super) fn clamp_follow_x(pointer_x: f32, min_x: f32, max_x: f32) -> f32 {
    if min_x > max_x {
        return (min_x + max_x) / 2.0;
    }
    if !pointer_x.is_finite() {
        return (min_x + max_x) / 2.0;
    }
    pointer_x.clamp(min_x, max_x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key(9, 4), (4, 9));
        assert_eq!(pair_key(4, 9), (4, 9));
    }

    #[test]
    fn clamp_follow_x_limits_to_walls() {
        assert_eq!(clamp_follow_x(0.0, 53.0, 487.0), 53.0);
        assert_eq!(clamp_follow_x(900.0, 53.0, 487.0), 487.0);
        assert_eq!(clamp_follow_x(200.0, 53.0, 487.0), 200.0);
    }

    #[test]
    fn clamp_follow_x_never_panics_on_bad_input() {
        assert_eq!(clamp_follow_x(100.0, 300.0, 200.0), 250.0);
        assert_eq!(clamp_follow_x(f32::NAN, 53.0, 487.0), 270.0);
    }
}
