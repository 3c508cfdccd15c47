//! Per-axis position smoothing.
//!
//! Raw face centers jitter from frame to frame and sometimes disappear.
//! [`PositionEstimator`] runs one filter per axis and applies the
//! freeze/drift policy for missed detections:
//!
//! - while the miss streak is within `freeze_threshold`, the Kalman filter
//!   extrapolates and the EMA holds its last value;
//! - past the threshold the frame center is fed as a measurement, so the
//!   window drifts back to the middle instead of staying off-screen.

use reframe_models::SmoothingMethod;

use super::config::SmootherSettings;

/// Initial covariance; large so the first updates converge quickly.
const INITIAL_COVARIANCE: f64 = 1000.0;

/// 1-D constant-velocity Kalman filter. State is `[position, velocity]`.
#[derive(Debug, Clone)]
pub struct KalmanFilter1D {
    state: [f64; 2],
    covariance: [[f64; 2]; 2],
    process_noise: f64,
    measurement_noise: f64,
    initialized: bool,
}

impl KalmanFilter1D {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            state: [0.0, 0.0],
            covariance: [[INITIAL_COVARIANCE, 0.0], [0.0, INITIAL_COVARIANCE]],
            process_noise,
            measurement_noise,
            initialized: false,
        }
    }

    /// Advance one frame without a measurement and return the predicted position.
    pub fn predict(&mut self) -> f64 {
        let [p, v] = self.state;
        self.state = [p + v, v];

        // P = F P F^T + Q with F = [[1, 1], [0, 1]]
        let [[p00, p01], [p10, p11]] = self.covariance;
        self.covariance = [
            [p00 + p01 + p10 + p11 + self.process_noise, p01 + p11],
            [p10 + p11, p11 + self.process_noise],
        ];

        self.state[0]
    }

    /// Incorporate a measurement and return the corrected position.
    ///
    /// The first measurement is taken as-is.
    pub fn update(&mut self, measurement: f64) -> f64 {
        if !self.initialized {
            self.state = [measurement, 0.0];
            self.initialized = true;
            return measurement;
        }

        self.predict();

        let residual = measurement - self.state[0];
        let [[p00, p01], [p10, p11]] = self.covariance;
        let innovation = p00 + self.measurement_noise;
        let gain = [p00 / innovation, p10 / innovation];

        self.state[0] += gain[0] * residual;
        self.state[1] += gain[1] * residual;

        // P = (I - K H) P with H = [1, 0]
        self.covariance = [
            [(1.0 - gain[0]) * p00, (1.0 - gain[0]) * p01],
            [p10 - gain[1] * p00, p11 - gain[1] * p01],
        ];

        self.state[0]
    }

    pub fn position(&self) -> f64 {
        self.state[0]
    }

    /// Estimated velocity in pixels per step.
    pub fn velocity(&self) -> f64 {
        self.state[1]
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Exponential moving average: `s = alpha * z + (1 - alpha) * s`.
#[derive(Debug, Clone)]
pub struct EmaFilter {
    alpha: f64,
    value: Option<f64>,
}

impl EmaFilter {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, measurement: f64) -> f64 {
        let next = match self.value {
            None => measurement,
            Some(prev) => self.alpha * measurement + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// One axis of the estimator, either strategy.
#[derive(Debug, Clone)]
pub enum AxisFilter {
    Kalman(KalmanFilter1D),
    Ema(EmaFilter),
}

impl AxisFilter {
    pub fn new(method: SmoothingMethod, settings: &SmootherSettings) -> Self {
        match method {
            SmoothingMethod::Kalman => {
                AxisFilter::Kalman(KalmanFilter1D::new(settings.process_noise, settings.measurement_noise))
            }
            SmoothingMethod::Ema => AxisFilter::Ema(EmaFilter::new(settings.ema_alpha)),
        }
    }

    pub fn update(&mut self, measurement: f64) -> f64 {
        match self {
            AxisFilter::Kalman(f) => f.update(measurement),
            AxisFilter::Ema(f) => f.update(measurement),
        }
    }

    /// Position for a step without measurement: Kalman extrapolates, EMA holds.
    pub fn coast(&mut self) -> Option<f64> {
        match self {
            AxisFilter::Kalman(f) if f.is_initialized() => Some(f.predict()),
            AxisFilter::Kalman(_) => None,
            AxisFilter::Ema(f) => f.value(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        match self {
            AxisFilter::Kalman(f) => f.is_initialized(),
            AxisFilter::Ema(f) => f.value().is_some(),
        }
    }
}

/// Smoothed `(x, y)` subject position with the freeze/drift policy.
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    method: SmoothingMethod,
    settings: SmootherSettings,
    x: AxisFilter,
    y: AxisFilter,
    frame_center: (f64, f64),
    no_face_streak: u32,
    last: Option<(f64, f64)>,
}

impl PositionEstimator {
    pub fn new(method: SmoothingMethod, settings: SmootherSettings, frame_center: (f64, f64)) -> Self {
        Self {
            method,
            settings,
            x: AxisFilter::new(method, &settings),
            y: AxisFilter::new(method, &settings),
            frame_center,
            no_face_streak: 0,
            last: None,
        }
    }

    /// Feed one detection pass: the subject center, or `None` when nothing was found.
    pub fn update(&mut self, center: Option<(f64, f64)>) -> (f64, f64) {
        let position = match center {
            Some((cx, cy)) => {
                self.no_face_streak = 0;
                (self.x.update(cx), self.y.update(cy))
            }
            None => self.on_missing(),
        };
        self.last = Some(position);
        position
    }

    fn on_missing(&mut self) -> (f64, f64) {
        self.no_face_streak = self.no_face_streak.saturating_add(1);

        // Never seen a subject: sit at the center without seeding the filters,
        // so the first real detection still snaps.
        if !self.x.is_initialized() || !self.y.is_initialized() {
            return self.frame_center;
        }

        if self.no_face_streak <= self.settings.freeze_threshold {
            let (fx, fy) = self.last.unwrap_or(self.frame_center);
            let x = self.x.coast().unwrap_or(fx);
            let y = self.y.coast().unwrap_or(fy);
            (x, y)
        } else {
            let (cx, cy) = self.frame_center;
            (self.x.update(cx), self.y.update(cy))
        }
    }

    /// Clear both axes and the miss streak for a new segment.
    pub fn reset(&mut self) {
        *self = Self::new(self.method, self.settings, self.frame_center);
    }

    pub fn method(&self) -> SmoothingMethod {
        self.method
    }

    pub fn no_face_streak(&self) -> u32 {
        self.no_face_streak
    }

    pub fn last_position(&self) -> Option<(f64, f64)> {
        self.last
    }

    /// Whether the miss streak is past the freeze threshold.
    pub fn is_drifting(&self) -> bool {
        self.no_face_streak > self.settings.freeze_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: (f64, f64) = (960.0, 540.0);

    fn kalman() -> KalmanFilter1D {
        let s = SmootherSettings::default();
        KalmanFilter1D::new(s.process_noise, s.measurement_noise)
    }

    fn estimator(method: SmoothingMethod) -> PositionEstimator {
        PositionEstimator::new(method, SmootherSettings::default(), CENTER)
    }

    /// Deterministic pseudo-noise in [-amp, amp].
    fn noise(i: usize, amp: f64) -> f64 {
        let h = (i as u64).wrapping_mul(2_654_435_761) % 1000;
        (h as f64 / 999.0 * 2.0 - 1.0) * amp
    }

    fn jitter(values: &[f64]) -> f64 {
        values.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (values.len() - 1) as f64
    }

    #[test]
    fn test_kalman_first_update_snaps() {
        let mut f = kalman();
        assert_eq!(f.update(123.0), 123.0);
        assert!(f.is_initialized());
    }

    #[test]
    fn test_kalman_converges_on_constant_input() {
        let mut f = kalman();
        f.update(0.0);
        let mut position = 0.0;
        for _ in 0..50 {
            position = f.update(200.0);
        }
        assert!((position - 200.0).abs() < 1.0, "position {}", position);
    }

    #[test]
    fn test_kalman_velocity_positive_on_ramp() {
        let mut f = kalman();
        for i in 0..20 {
            f.update(100.0 + 5.0 * i as f64);
        }
        assert!(f.velocity() > 0.0);
        let predicted = f.predict();
        assert!(predicted > 180.0, "predicted {}", predicted);
    }

    #[test]
    fn test_kalman_reduces_noise() {
        let mut f = kalman();
        let raw: Vec<f64> = (0..200).map(|i| 500.0 + noise(i, 30.0)).collect();
        let smoothed: Vec<f64> = raw.iter().map(|&z| f.update(z)).collect();
        assert!(jitter(&smoothed[20..]) < jitter(&raw[20..]) / 2.0);
    }

    #[test]
    fn test_ema_step_response_scales_with_alpha() {
        let mut fast = EmaFilter::new(0.5);
        let mut slow = EmaFilter::new(0.1);
        fast.update(0.0);
        slow.update(0.0);
        assert!(fast.update(100.0) > slow.update(100.0));
    }

    #[test]
    fn test_ema_lower_alpha_has_lower_jitter() {
        let raw: Vec<f64> = (0..300).map(|i| 400.0 + noise(i, 25.0)).collect();
        let mut fast = EmaFilter::new(0.6);
        let mut slow = EmaFilter::new(0.1);
        let fast_out: Vec<f64> = raw.iter().map(|&z| fast.update(z)).collect();
        let slow_out: Vec<f64> = raw.iter().map(|&z| slow.update(z)).collect();
        assert!(jitter(&slow_out) < jitter(&fast_out));
    }

    #[test]
    fn test_ema_first_value_snaps() {
        let mut f = EmaFilter::new(0.15);
        assert_eq!(f.update(42.0), 42.0);
        assert!((f.update(142.0) - 57.0).abs() < 1e-9);
    }

    #[test]
    fn test_freeze_within_threshold_kalman() {
        let mut est = estimator(SmoothingMethod::Kalman);
        for _ in 0..30 {
            est.update(Some((300.0, 200.0)));
        }
        for _ in 0..10 {
            let (x, y) = est.update(None);
            assert!((x - 300.0).abs() < 5.0, "x drifted to {}", x);
            assert!((y - 200.0).abs() < 5.0, "y drifted to {}", y);
        }
        assert!(!est.is_drifting());
    }

    #[test]
    fn test_drift_past_threshold() {
        for method in SmoothingMethod::ALL {
            let mut est = estimator(*method);
            for _ in 0..30 {
                est.update(Some((300.0, 200.0)));
            }
            let mut last = (300.0, 200.0);
            for _ in 0..10 {
                last = est.update(None);
            }
            for _ in 0..15 {
                last = est.update(None);
            }
            assert!(est.is_drifting());
            assert!(last.0 > 400.0, "{:?}: x only reached {}", method, last.0);
            assert!(last.1 > 250.0, "{:?}: y only reached {}", method, last.1);
        }
    }

    #[test]
    fn test_ema_holds_on_miss() {
        let mut est = estimator(SmoothingMethod::Ema);
        est.update(Some((100.0, 100.0)));
        assert_eq!(est.update(None), (100.0, 100.0));
        assert_eq!(est.no_face_streak(), 1);
    }

    #[test]
    fn test_detection_resets_streak() {
        let mut est = estimator(SmoothingMethod::Kalman);
        est.update(Some((100.0, 100.0)));
        est.update(None);
        est.update(None);
        assert_eq!(est.no_face_streak(), 2);
        est.update(Some((100.0, 100.0)));
        assert_eq!(est.no_face_streak(), 0);
    }

    #[test]
    fn test_unseeded_miss_returns_center_then_snaps() {
        let mut est = estimator(SmoothingMethod::Kalman);
        for _ in 0..15 {
            assert_eq!(est.update(None), CENTER);
        }
        assert_eq!(est.update(Some((1500.0, 300.0))), (1500.0, 300.0));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut est = estimator(SmoothingMethod::Ema);
        est.update(Some((10.0, 10.0)));
        est.update(None);
        est.reset();
        assert_eq!(est.no_face_streak(), 0);
        assert_eq!(est.last_position(), None);
        assert_eq!(est.update(Some((700.0, 400.0))), (700.0, 400.0));
    }
}
