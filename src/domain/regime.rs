//! Market regime classification.
//!
//! Each bar is classified along three axes:
//! - Trend: uptrend | downtrend | neutral (ADX gate, close vs SMA50 vs SMA200)
//! - Volatility: low | high (normalized ATR and Bollinger width against
//!   rolling percentile cutoffs)
//! - Momentum: bullish | bearish | weak (ROC, MACD histogram and RSI votes)
//!
//! and collapsed into a simplified label. Label priority, first match wins:
//! CHOPPY, TREND_UP, TREND_DOWN, RANGE, NEUTRAL.

use crate::domain::adaptive::{AdaptiveThresholds, DEFAULT_WINDOW, MAX_WINDOW};
use crate::domain::error::RegimeTraderError;
use crate::domain::indicator::{IndicatorField, IndicatorSnapshot, IndicatorType};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrendState {
    Uptrend,
    Downtrend,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VolatilityState {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MomentumState {
    Bullish,
    Bearish,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimplifiedRegime {
    TrendUp,
    TrendDown,
    Range,
    Choppy,
    Neutral,
}

/// Regime of a single bar. A fresh value is produced every bar.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeState {
    pub trend: TrendState,
    pub volatility: VolatilityState,
    pub momentum: MomentumState,
    /// e.g. `UPTREND_LOWVOL_BULLISHMOM`
    pub full_regime: String,
    pub simplified: SimplifiedRegime,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub adx_sideways_threshold: f64,
    pub adx_strong_threshold: f64,
    pub adx_very_strong_threshold: f64,
    pub rsi_bullish: f64,
    pub rsi_bearish: f64,
    pub momentum_score_threshold: usize,
    pub adaptive_window: usize,
    pub vol_low_percentile: f64,
    pub vol_high_percentile: f64,
    pub atr_default_thresholds: (f64, f64),
    pub width_default_thresholds: (f64, f64),
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    pub adx_period: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub roc_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_sideways_threshold: 20.0,
            adx_strong_threshold: 25.0,
            adx_very_strong_threshold: 40.0,
            rsi_bullish: 55.0,
            rsi_bearish: 45.0,
            momentum_score_threshold: 2,
            adaptive_window: DEFAULT_WINDOW,
            vol_low_percentile: 30.0,
            vol_high_percentile: 70.0,
            atr_default_thresholds: (0.005, 0.015),
            width_default_thresholds: (0.02, 0.06),
            sma_fast_period: 50,
            sma_slow_period: 200,
            adx_period: 14,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            roc_period: 10,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl RegimeConfig {
    pub fn sma_fast(&self) -> IndicatorType {
        IndicatorType::Sma(self.sma_fast_period)
    }

    pub fn sma_slow(&self) -> IndicatorType {
        IndicatorType::Sma(self.sma_slow_period)
    }

    pub fn adx(&self) -> IndicatorType {
        IndicatorType::Adx(self.adx_period)
    }

    pub fn atr(&self) -> IndicatorType {
        IndicatorType::Atr(self.atr_period)
    }

    pub fn bollinger(&self) -> IndicatorType {
        IndicatorType::bollinger(self.bollinger_period, self.bollinger_mult)
    }

    pub fn roc(&self) -> IndicatorType {
        IndicatorType::Roc(self.roc_period)
    }

    pub fn rsi(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn macd(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    /// Indicators the classifier reads from each snapshot.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            self.sma_fast(),
            self.sma_slow(),
            self.adx(),
            self.atr(),
            self.bollinger(),
            self.roc(),
            self.rsi(),
            self.macd(),
        ]
    }

    /// Reject windows and indicator parameters no calculator can run with.
    pub fn validate(&self) -> Result<(), RegimeTraderError> {
        if self.adaptive_window == 0 || self.adaptive_window > MAX_WINDOW {
            return Err(RegimeTraderError::invalid(
                "regime",
                "adaptive_window",
                format!("must be in [1, {}], got {}", MAX_WINDOW, self.adaptive_window),
            ));
        }
        for indicator in self.required_indicators() {
            indicator
                .validate()
                .map_err(|reason| RegimeTraderError::invalid("regime", &indicator.to_string(), reason))?;
        }
        Ok(())
    }
}

/// Classifies bars, owning the adaptive volatility trackers for one run.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
    atr_thresholds: AdaptiveThresholds,
    width_thresholds: AdaptiveThresholds,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        let (lo, hi) = (config.vol_low_percentile, config.vol_high_percentile);
        let atr_thresholds = AdaptiveThresholds::new(config.adaptive_window, config.atr_default_thresholds)
            .with_percentiles(lo, hi);
        let width_thresholds =
            AdaptiveThresholds::new(config.adaptive_window, config.width_default_thresholds)
                .with_percentiles(lo, hi);
        Self {
            config,
            atr_thresholds,
            width_thresholds,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        self.config.required_indicators()
    }

    pub fn atr_thresholds(&self) -> &AdaptiveThresholds {
        &self.atr_thresholds
    }

    pub fn width_thresholds(&self) -> &AdaptiveThresholds {
        &self.width_thresholds
    }

    /// Feed this bar's volatility samples to the trackers. Bars missing
    /// ATR or Bollinger values leave the trackers untouched.
    pub fn observe(&mut self, snapshot: &IndicatorSnapshot) {
        if let Some((natr, width)) = self.volatility_samples(snapshot) {
            self.atr_thresholds.update(natr);
            self.width_thresholds.update(width);
        }
    }

    /// Classify a bar against the trackers as they stand.
    pub fn classify(&self, snapshot: &IndicatorSnapshot) -> RegimeState {
        let trend = self.trend_state(snapshot);
        let volatility = self.volatility_state(snapshot);
        let momentum = self.momentum_state(snapshot);
        let confidence = self.confidence(snapshot, trend, momentum);

        RegimeState {
            trend,
            volatility,
            momentum,
            full_regime: format!(
                "{}_{}VOL_{}MOM",
                trend.as_str().to_uppercase(),
                volatility.as_str().to_uppercase(),
                momentum.as_str().to_uppercase()
            ),
            simplified: simplify(trend, volatility, momentum),
            confidence,
        }
    }

    /// `observe` then `classify`.
    pub fn update(&mut self, snapshot: &IndicatorSnapshot) -> RegimeState {
        self.observe(snapshot);
        self.classify(snapshot)
    }

    fn volatility_samples(&self, snapshot: &IndicatorSnapshot) -> Option<(f64, f64)> {
        let atr = snapshot.simple(&self.config.atr())?;
        if snapshot.close == 0.0 || !snapshot.close.is_finite() {
            return None;
        }
        let width = snapshot
            .get(&self.config.bollinger())?
            .field(IndicatorField::BollingerWidth)?;
        Some((atr / snapshot.close, width))
    }

    fn trend_state(&self, snapshot: &IndicatorSnapshot) -> TrendState {
        let cfg = &self.config;
        let (Some(adx), Some(sma50)) = (snapshot.simple(&cfg.adx()), snapshot.simple(&cfg.sma_fast())) else {
            return TrendState::Neutral;
        };
        if adx < cfg.adx_sideways_threshold {
            return TrendState::Neutral;
        }
        let close = snapshot.close;
        match snapshot.simple(&cfg.sma_slow()) {
            Some(sma200) => {
                if close > sma50 && sma50 > sma200 {
                    TrendState::Uptrend
                } else if close < sma50 && sma50 < sma200 {
                    TrendState::Downtrend
                } else {
                    TrendState::Neutral
                }
            }
            None => {
                if close > sma50 {
                    TrendState::Uptrend
                } else if close < sma50 {
                    TrendState::Downtrend
                } else {
                    TrendState::Neutral
                }
            }
        }
    }

    fn volatility_state(&self, snapshot: &IndicatorSnapshot) -> VolatilityState {
        let Some((natr, width)) = self.volatility_samples(snapshot) else {
            return VolatilityState::Low;
        };
        let (atr_p30, atr_p70) = self.atr_thresholds.thresholds();
        let (width_p30, width_p70) = self.width_thresholds.thresholds();

        if natr > atr_p70 || width > width_p70 {
            return VolatilityState::High;
        }
        if natr < atr_p30 && width < width_p30 {
            tracing::trace!(natr, width, "both volatility measures under the low cutoffs");
        }
        // below the low cutoffs on both, or between the cutoffs
        VolatilityState::Low
    }

    fn momentum_state(&self, snapshot: &IndicatorSnapshot) -> MomentumState {
        let cfg = &self.config;
        let roc = snapshot.simple(&cfg.roc());
        let hist = macd_histogram(snapshot, &cfg.macd());
        let rsi = snapshot.simple(&cfg.rsi());
        let (Some(roc), Some(hist), Some(rsi)) = (roc, hist, rsi) else {
            return MomentumState::Weak;
        };

        let bullish = [roc > 0.0, hist > 0.0, rsi > cfg.rsi_bullish]
            .iter()
            .filter(|b| **b)
            .count();
        let bearish = [roc < 0.0, hist < 0.0, rsi < cfg.rsi_bearish]
            .iter()
            .filter(|b| **b)
            .count();

        if bullish >= cfg.momentum_score_threshold {
            MomentumState::Bullish
        } else if bearish >= cfg.momentum_score_threshold {
            MomentumState::Bearish
        } else {
            MomentumState::Weak
        }
    }

    fn confidence(&self, snapshot: &IndicatorSnapshot, trend: TrendState, momentum: MomentumState) -> f64 {
        let cfg = &self.config;
        let adx = snapshot.simple(&cfg.adx());
        let mut confidence = 0.5;

        if let Some(adx) = adx {
            if adx > cfg.adx_very_strong_threshold {
                confidence += 0.3;
            } else if adx > cfg.adx_strong_threshold {
                confidence += 0.15;
            } else if adx < cfg.adx_sideways_threshold {
                confidence -= 0.1;
            }
        }

        match (trend, momentum) {
            (TrendState::Uptrend, MomentumState::Bullish) | (TrendState::Downtrend, MomentumState::Bearish) => {
                confidence += 0.2;
            }
            (TrendState::Uptrend | TrendState::Downtrend, MomentumState::Weak) => {
                confidence -= 0.1;
            }
            _ => {}
        }

        let missing = [
            snapshot.simple(&cfg.rsi()).is_none(),
            macd_histogram(snapshot, &cfg.macd()).is_none(),
            adx.is_none(),
        ]
        .iter()
        .filter(|m| **m)
        .count();
        confidence -= missing as f64 * 0.1;

        confidence.clamp(0.0, 1.0)
    }
}

fn macd_histogram(snapshot: &IndicatorSnapshot, macd: &IndicatorType) -> Option<f64> {
    snapshot.get(macd)?.field(IndicatorField::MacdHistogram)
}

/// Collapse the three axes into a simplified label.
pub fn simplify(trend: TrendState, volatility: VolatilityState, momentum: MomentumState) -> SimplifiedRegime {
    if volatility == VolatilityState::High && momentum == MomentumState::Weak {
        SimplifiedRegime::Choppy
    } else if trend == TrendState::Uptrend && momentum == MomentumState::Bullish {
        SimplifiedRegime::TrendUp
    } else if trend == TrendState::Downtrend && momentum == MomentumState::Bearish {
        SimplifiedRegime::TrendDown
    } else if trend == TrendState::Neutral && volatility == VolatilityState::Low {
        SimplifiedRegime::Range
    } else {
        SimplifiedRegime::Neutral
    }
}

impl TrendState {
    pub const ALL: [TrendState; 3] = [TrendState::Uptrend, TrendState::Downtrend, TrendState::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendState::Uptrend => "uptrend",
            TrendState::Downtrend => "downtrend",
            TrendState::Neutral => "neutral",
        }
    }
}

impl VolatilityState {
    pub const ALL: [VolatilityState; 2] = [VolatilityState::Low, VolatilityState::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityState::Low => "low",
            VolatilityState::High => "high",
        }
    }
}

impl MomentumState {
    pub const ALL: [MomentumState; 3] = [MomentumState::Bullish, MomentumState::Bearish, MomentumState::Weak];

    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumState::Bullish => "bullish",
            MomentumState::Bearish => "bearish",
            MomentumState::Weak => "weak",
        }
    }
}

impl SimplifiedRegime {
    pub const ALL: [SimplifiedRegime; 5] = [
        SimplifiedRegime::TrendUp,
        SimplifiedRegime::TrendDown,
        SimplifiedRegime::Range,
        SimplifiedRegime::Choppy,
        SimplifiedRegime::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimplifiedRegime::TrendUp => "TREND_UP",
            SimplifiedRegime::TrendDown => "TREND_DOWN",
            SimplifiedRegime::Range => "RANGE",
            SimplifiedRegime::Choppy => "CHOPPY",
            SimplifiedRegime::Neutral => "NEUTRAL",
        }
    }
}

fn parse_name<T: Copy>(s: &str, all: &[T], name: fn(&T) -> &'static str, what: &str) -> Result<T, String> {
    all.iter()
        .find(|v| name(*v).eq_ignore_ascii_case(s.trim()))
        .copied()
        .ok_or_else(|| {
            let valid: Vec<&str> = all.iter().map(name).collect();
            format!("unknown {} '{}' (expected one of: {})", what, s, valid.join(", "))
        })
}

impl FromStr for TrendState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s, &Self::ALL, Self::as_str, "trend state")
    }
}

impl FromStr for VolatilityState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s, &Self::ALL, Self::as_str, "volatility state")
    }
}

impl FromStr for MomentumState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s, &Self::ALL, Self::as_str, "momentum state")
    }
}

impl FromStr for SimplifiedRegime {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s, &Self::ALL, Self::as_str, "regime")
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VolatilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MomentumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SimplifiedRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorValue;
    use chrono::NaiveDate;

    struct SnapBuilder {
        snap: IndicatorSnapshot,
        cfg: RegimeConfig,
    }

    impl SnapBuilder {
        fn new(close: f64) -> Self {
            let snap = IndicatorSnapshot {
                open_time: NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                values: Default::default(),
            };
            Self {
                snap,
                cfg: RegimeConfig::default(),
            }
        }

        fn simple(mut self, t: IndicatorType, v: f64) -> Self {
            self.snap.values.insert(t, IndicatorValue::Simple(v));
            self
        }

        fn trend(self, adx: f64, sma50: f64, sma200: f64) -> Self {
            let (a, f, s) = (self.cfg.adx(), self.cfg.sma_fast(), self.cfg.sma_slow());
            self.simple(a, adx).simple(f, sma50).simple(s, sma200)
        }

        fn momentum(mut self, roc: f64, hist: f64, rsi: f64) -> Self {
            let macd = self.cfg.macd();
            self.snap.values.insert(
                macd,
                IndicatorValue::Macd {
                    line: hist,
                    signal: 0.0,
                    histogram: hist,
                },
            );
            let (r, s) = (self.cfg.roc(), self.cfg.rsi());
            self.simple(r, roc).simple(s, rsi)
        }

        fn volatility(mut self, atr: f64, half_band: f64) -> Self {
            let close = self.snap.close;
            let bb = self.cfg.bollinger();
            self.snap.values.insert(
                bb,
                IndicatorValue::Bollinger {
                    upper: close + half_band,
                    middle: close,
                    lower: close - half_band,
                },
            );
            let a = self.cfg.atr();
            self.simple(a, atr)
        }

        fn build(self) -> IndicatorSnapshot {
            self.snap
        }
    }

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(RegimeConfig::default())
    }

    #[test]
    fn uptrend_requires_stacked_averages() {
        let c = classifier();
        let snap = SnapBuilder::new(110.0).trend(30.0, 105.0, 100.0).build();
        assert_eq!(c.classify(&snap).trend, TrendState::Uptrend);
        let snap = SnapBuilder::new(110.0).trend(30.0, 105.0, 108.0).build();
        assert_eq!(c.classify(&snap).trend, TrendState::Neutral);
    }

    #[test]
    fn downtrend() {
        let snap = SnapBuilder::new(90.0).trend(30.0, 95.0, 100.0).build();
        assert_eq!(classifier().classify(&snap).trend, TrendState::Downtrend);
    }

    #[test]
    fn weak_adx_is_neutral() {
        let snap = SnapBuilder::new(110.0).trend(19.9, 105.0, 100.0).build();
        assert_eq!(classifier().classify(&snap).trend, TrendState::Neutral);
    }

    #[test]
    fn missing_sma200_falls_back_to_sma50() {
        let cfg = RegimeConfig::default();
        let snap = SnapBuilder::new(110.0)
            .simple(cfg.adx(), 30.0)
            .simple(cfg.sma_fast(), 105.0)
            .build();
        assert_eq!(classifier().classify(&snap).trend, TrendState::Uptrend);
    }

    #[test]
    fn missing_trend_inputs_are_neutral() {
        let snap = SnapBuilder::new(110.0).build();
        assert_eq!(classifier().classify(&snap).trend, TrendState::Neutral);
    }

    #[test]
    fn momentum_votes() {
        let c = classifier();
        let bull = SnapBuilder::new(100.0).momentum(1.0, 0.5, 50.0).build();
        assert_eq!(c.classify(&bull).momentum, MomentumState::Bullish);
        let bear = SnapBuilder::new(100.0).momentum(-1.0, 0.5, 40.0).build();
        assert_eq!(c.classify(&bear).momentum, MomentumState::Bearish);
        let weak = SnapBuilder::new(100.0).momentum(1.0, -0.5, 50.0).build();
        assert_eq!(c.classify(&weak).momentum, MomentumState::Weak);
        let missing = SnapBuilder::new(100.0).build();
        assert_eq!(c.classify(&missing).momentum, MomentumState::Weak);
    }

    #[test]
    fn volatility_uses_defaults_while_warming() {
        let c = classifier();
        // natr 0.02 > 0.015 default high cutoff
        let high = SnapBuilder::new(100.0).volatility(2.0, 0.5).build();
        assert_eq!(c.classify(&high).volatility, VolatilityState::High);
        // natr 0.001, width 0.01: both under the low cutoffs
        let low = SnapBuilder::new(100.0).volatility(0.1, 0.5).build();
        assert_eq!(c.classify(&low).volatility, VolatilityState::Low);
        // natr between cutoffs, width low: defaults to low
        let mid = SnapBuilder::new(100.0).volatility(1.0, 0.5).build();
        assert_eq!(c.classify(&mid).volatility, VolatilityState::Low);
    }

    #[test]
    fn volatility_adapts_after_warmup() {
        let cfg = RegimeConfig {
            adaptive_window: 4,
            ..RegimeConfig::default()
        };
        let mut c = RegimeClassifier::new(cfg);
        for atr in [1.0, 2.0, 3.0] {
            c.observe(&SnapBuilder::new(100.0).volatility(atr, 0.5).build());
        }
        assert!(!c.atr_thresholds().is_warm());
        // natr 0.04 joins [0.01, 0.02, 0.03]: p70 = 0.031, so high
        let state = c.update(&SnapBuilder::new(100.0).volatility(4.0, 0.5).build());
        assert!(c.atr_thresholds().is_warm());
        assert_eq!(state.volatility, VolatilityState::High);
    }

    #[test]
    fn missing_volatility_inputs_leave_trackers_untouched() {
        let mut c = classifier();
        let state = c.update(&SnapBuilder::new(100.0).build());
        assert_eq!(state.volatility, VolatilityState::Low);
        assert!(c.atr_thresholds().is_empty());
    }

    #[test]
    fn simplified_priority() {
        use MomentumState as M;
        use TrendState as T;
        use VolatilityState as V;
        assert_eq!(simplify(T::Uptrend, V::High, M::Weak), SimplifiedRegime::Choppy);
        assert_eq!(simplify(T::Uptrend, V::High, M::Bullish), SimplifiedRegime::TrendUp);
        assert_eq!(simplify(T::Downtrend, V::Low, M::Bearish), SimplifiedRegime::TrendDown);
        assert_eq!(simplify(T::Neutral, V::Low, M::Weak), SimplifiedRegime::Range);
        assert_eq!(simplify(T::Neutral, V::Low, M::Bullish), SimplifiedRegime::Range);
        assert_eq!(simplify(T::Neutral, V::High, M::Bullish), SimplifiedRegime::Neutral);
        assert_eq!(simplify(T::Uptrend, V::Low, M::Bearish), SimplifiedRegime::Neutral);
    }

    #[test]
    fn full_regime_label() {
        let snap = SnapBuilder::new(110.0)
            .trend(45.0, 105.0, 100.0)
            .momentum(1.0, 0.5, 60.0)
            .volatility(0.1, 0.5)
            .build();
        let state = classifier().classify(&snap);
        assert_eq!(state.full_regime, "UPTREND_LOWVOL_BULLISHMOM");
        assert_eq!(state.simplified, SimplifiedRegime::TrendUp);
        // 0.5 + 0.3 (adx > 40) + 0.2 (aligned)
        assert!((state.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_penalties() {
        // nothing available: 0.5 - 3 * 0.1
        let state = classifier().classify(&SnapBuilder::new(100.0).build());
        assert!((state.confidence - 0.2).abs() < 1e-9);

        // directional trend with weak momentum, adx between 25 and 40
        let snap = SnapBuilder::new(110.0)
            .trend(30.0, 105.0, 100.0)
            .momentum(1.0, -0.5, 50.0)
            .build();
        let state = classifier().classify(&snap);
        assert!((state.confidence - 0.55).abs() < 1e-9);
    }

    #[test]
    fn names_round_trip_case_insensitively() {
        assert_eq!("trend_up".parse::<SimplifiedRegime>(), Ok(SimplifiedRegime::TrendUp));
        assert_eq!("HIGH".parse::<VolatilityState>(), Ok(VolatilityState::High));
        assert!("sideways".parse::<TrendState>().is_err());
        assert_eq!(SimplifiedRegime::Choppy.to_string(), "CHOPPY");
    }

    #[test]
    fn required_indicators_cover_every_axis() {
        let required = RegimeConfig::default().required_indicators();
        assert_eq!(required.len(), 8);
        assert!(required.contains(&IndicatorType::Sma(200)));
        assert!(required.contains(&IndicatorType::bollinger(20, 2.0)));
    }

    #[test]
    fn validate_bounds_window_and_periods() {
        assert!(RegimeConfig::default().validate().is_ok());
        let huge_rsi = RegimeConfig {
            rsi_period: crate::domain::indicator::MAX_PERIOD + 1,
            ..RegimeConfig::default()
        };
        assert!(matches!(
            huge_rsi.validate(),
            Err(RegimeTraderError::ConfigInvalid { ref key, .. }) if key == "RSI(10001)"
        ));
        let huge_window = RegimeConfig {
            adaptive_window: MAX_WINDOW + 1,
            ..RegimeConfig::default()
        };
        assert!(huge_window.validate().is_err());
    }
}
