//! Black-Scholes pricing and Greeks for commodity options

use crate::types::{Greeks, OptionType};
use std::f64::consts::PI;

pub const MIN_TIME: f64 = 1.0 / (365.25 * 24.0 * 3600.0);
pub const MIN_VOL: f64 = 0.01;
pub const MAX_VOL: f64 = 5.0;

/// Pricing inputs, normalized before use
#[derive(Debug, Clone, Copy)]
pub struct PricingInputs {
    pub spot: f64,
    pub strike: f64,
    /// Time to expiry in years
    pub time: f64,
    pub vol: f64,
    pub rate: f64,
    pub option_type: OptionType,
}

impl PricingInputs {
    fn normalize(&mut self) {
        self.time = self.time.max(MIN_TIME);
        self.vol = self.vol.clamp(MIN_VOL, MAX_VOL);
    }
}

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Abramowitz-Stegun polynomial approximation, ~1e-7 absolute error
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = k * (0.319381530
        + k * (-0.356563782
        + k * (1.781477937
        + k * (-1.821255978
        + k * 1.330274429))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

fn d1_d2(input: &PricingInputs) -> (f64, f64) {
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;

    let d1 = ((s / k).ln() + (r + 0.5 * v * v) * t) / (v * t.sqrt());
    let d2 = d1 - v * t.sqrt();

    (d1, d2)
}

pub fn option_price(mut input: PricingInputs) -> f64 {
    input.normalize();

    let (d1, d2) = d1_d2(&input);
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let r = input.rate;

    let price = match input.option_type {
        OptionType::Call => s * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2),
        OptionType::Put => k * (-r * t).exp() * norm_cdf(-d2) - s * norm_cdf(-d1),
    };

    price.max(0.0)
}

pub fn intrinsic_value(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

pub fn option_greeks(mut input: PricingInputs) -> Greeks {
    input.normalize();

    let (d1, d2) = d1_d2(&input);
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;

    let pdf = norm_pdf(d1);
    let sqrt_t = t.sqrt();

    let delta = match input.option_type {
        OptionType::Call => norm_cdf(d1),
        OptionType::Put => norm_cdf(d1) - 1.0,
    };

    let gamma = pdf / (s * v * sqrt_t);

    let vega = s * pdf * sqrt_t;

    let theta = match input.option_type {
        OptionType::Call => {
            -(s * pdf * v) / (2.0 * sqrt_t) - r * k * (-r * t).exp() * norm_cdf(d2)
        }
        OptionType::Put => {
            -(s * pdf * v) / (2.0 * sqrt_t) + r * k * (-r * t).exp() * norm_cdf(-d2)
        }
    };

    let rho = match input.option_type {
        OptionType::Call => k * t * (-r * t).exp() * norm_cdf(d2),
        OptionType::Put => -k * t * (-r * t).exp() * norm_cdf(-d2),
    };

    Greeks {
        delta,
        gamma,
        theta,
        vega,
        rho,
    }
}
