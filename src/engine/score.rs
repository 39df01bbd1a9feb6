/// Focus score in [0, 1]: activity level scaled by how close the seated
/// timer is to the prolonged threshold, with a posture correction. Pure and
/// deterministic; undefined inputs degrade to neutral defaults.
pub fn score(
    normalized_activity: f64,
    seated_minutes: f64,
    prolonged_seated_minutes: f64,
    posture_score: Option<f64>,
) -> f64 {
    let activity = if normalized_activity.is_finite() {
        normalized_activity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let seated = if seated_minutes.is_finite() {
        seated_minutes.max(0.0)
    } else {
        0.0
    };

    // Linear falloff toward the prolonged threshold.
    let ratio = (seated / prolonged_seated_minutes.max(1.0)).min(1.0);

    // Posture never fully zeroes the score: a tracked-but-terrible posture
    // bottoms out at 0.5, untracked is neutral.
    let modifier = match posture_score.filter(|p| p.is_finite()) {
        Some(p) if p > 0.0 => p.min(1.0),
        Some(_) => 0.5,
        None => 1.0,
    };

    let value = (1.0 - ratio) * activity * modifier;
    (value * 10_000.0).round() / 10_000.0
}
