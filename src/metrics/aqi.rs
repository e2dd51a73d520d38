//! # Air Quality Index
//!
//! EPA-style piecewise-linear AQI for PM2.5 and PM10 mass concentrations.
//!
//! Each pollutant has seven concentration bands. A concentration is placed in
//! the band whose `[low, next_low)` range contains it and is linearly
//! interpolated onto the band's AQI range:
//!
//! `AQI = AQIlow + (C - Clow) / (Chigh - Clow) * (AQIhigh - AQIlow)`
//!
//! The result is truncated, not rounded. Concentrations outside every band
//! (negative, or above the last band) yield [`AQI_OUT_OF_RANGE`].
//!
//! | PM2.5 (µg/m³) | PM10 (µg/m³) | AQI |
//! |---------------|--------------|-----|
//! | 0.0 - 12.0 | 0 - 54 | 0 - 50 |
//! | 12.1 - 35.4 | 55 - 154 | 51 - 100 |
//! | 35.5 - 55.4 | 155 - 254 | 101 - 150 |
//! | 55.5 - 150.4 | 255 - 354 | 151 - 200 |
//! | 150.5 - 250.4 | 355 - 424 | 201 - 300 |
//! | 250.5 - 350.4 | 425 - 504 | 301 - 400 |
//! | 350.5 - 500.4 | 505 - 604 | 401 - 500 |

/// Returned when a concentration is outside every defined band.
pub const AQI_OUT_OF_RANGE: i32 = -1;

/// One concentration band mapped onto an AQI range.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Breakpoint {
    conc_low: f64,
    conc_high: f64,
    aqi_low: f64,
    aqi_high: f64,
}

const fn bp(conc_low: f64, conc_high: f64, aqi_low: f64, aqi_high: f64) -> Breakpoint {
    Breakpoint {
        conc_low,
        conc_high,
        aqi_low,
        aqi_high,
    }
}

const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    bp(0.0, 12.0, 0.0, 50.0),
    bp(12.1, 35.4, 51.0, 100.0),
    bp(35.5, 55.4, 101.0, 150.0),
    bp(55.5, 150.4, 151.0, 200.0),
    bp(150.5, 250.4, 201.0, 300.0),
    bp(250.5, 350.4, 301.0, 400.0),
    bp(350.5, 500.4, 401.0, 500.0),
];

const PM10_BREAKPOINTS: [Breakpoint; 7] = [
    bp(0.0, 54.0, 0.0, 50.0),
    bp(55.0, 154.0, 51.0, 100.0),
    bp(155.0, 254.0, 101.0, 150.0),
    bp(255.0, 354.0, 151.0, 200.0),
    bp(355.0, 424.0, 201.0, 300.0),
    bp(425.0, 504.0, 301.0, 400.0),
    bp(505.0, 604.0, 401.0, 500.0),
];

/// Upper (exclusive) edge of the last band for each table.
const PM25_CEILING: f64 = 500.5;
const PM10_CEILING: f64 = 605.0;

fn sub_index(table: &[Breakpoint], ceiling: f64, conc: f64) -> i32 {
    // Band i covers [low_i, low_{i+1}); the last band ends at `ceiling`.
    let band = table.iter().enumerate().find(|(i, band)| {
        let upper = table.get(i + 1).map_or(ceiling, |next| next.conc_low);
        conc >= band.conc_low && conc < upper
    });

    match band {
        Some((_, b)) => {
            let aqi = (conc - b.conc_low) / (b.conc_high - b.conc_low) * (b.aqi_high - b.aqi_low)
                + b.aqi_low;
            aqi as i32
        }
        None => AQI_OUT_OF_RANGE,
    }
}

/// AQI sub-index for a PM2.5 concentration in µg/m³.
#[must_use]
pub fn aqi_pm25(conc: f64) -> i32 {
    sub_index(&PM25_BREAKPOINTS, PM25_CEILING, conc)
}

/// AQI sub-index for a PM10 concentration in µg/m³.
#[must_use]
pub fn aqi_pm10(conc: f64) -> i32 {
    sub_index(&PM10_BREAKPOINTS, PM10_CEILING, conc)
}

/// Overall AQI: the worse of the PM2.5 and PM10 sub-indices.
///
/// If either sub-index is out of range the overall index is
/// [`AQI_OUT_OF_RANGE`], so an unmeasurable pollutant is never reported as
/// good air.
///
/// # Examples
///
/// ```
/// use weather_station::metrics::aqi::{air_quality_index, AQI_OUT_OF_RANGE};
///
/// assert_eq!(air_quality_index(0.0, 0.0), 0);
/// assert_eq!(air_quality_index(12.0, 54.0), 50);
/// assert_eq!(air_quality_index(501.0, 0.0), AQI_OUT_OF_RANGE);
/// ```
#[must_use]
pub fn air_quality_index(pm25: f64, pm10: f64) -> i32 {
    let aqi25 = aqi_pm25(pm25);
    let aqi10 = aqi_pm10(pm10);
    if aqi25 == AQI_OUT_OF_RANGE || aqi10 == AQI_OUT_OF_RANGE {
        return AQI_OUT_OF_RANGE;
    }
    aqi25.max(aqi10)
}
