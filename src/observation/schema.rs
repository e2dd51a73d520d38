//! # Observation Schema
//!
//! The single ordered definition of every field an [`Observation`] carries.
//!
//! Both the builder (to populate) and the recorder (to emit header and rows)
//! iterate [`SCHEMA`], so the tabular log's header can never drift from the
//! order of the values written beneath it.
//!
//! [`Observation`]: super::Observation

/// Header label of the leading timestamp column in the tabular log.
pub const TIMESTAMP_LABEL: &str = "Time [Local]";

/// Whether a field is reported as a float or an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Integer,
}

/// Every parameter reported by the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Temperature,
    Humidity,
    Pressure,
    SeaLevelPressure,
    GasResistance,
    HeatIndex,
    DewPoint,
    Pm1_0,
    Pm2_5,
    Pm10_0,
    ParticlesGt0_3,
    ParticlesGt0_5,
    ParticlesGt1_0,
    ParticlesGt2_5,
    ParticlesGt5_0,
    ParticlesGt10_0,
    AirQualityIndex,
    LightVisible,
    LightIr,
    LightUv,
    UvIndex,
    BatteryVoltage,
}

/// One schema entry: key, human-readable label and value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn float(key: FieldKey, label: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Float,
    }
}

const fn integer(key: FieldKey, label: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Integer,
    }
}

/// Number of fields in an observation (timestamp excluded).
pub const FIELD_COUNT: usize = 22;

/// Field order shared by the observation, the tabular log and the payload.
pub const SCHEMA: [FieldSpec; FIELD_COUNT] = [
    float(FieldKey::Temperature, "Temperature [C]"),
    float(FieldKey::Humidity, "rel. Humidity [%]"),
    float(FieldKey::Pressure, "Pressure [hPa]"),
    float(FieldKey::SeaLevelPressure, "Pressure (PMSL) [hPa]"),
    float(FieldKey::GasResistance, "Air [KOhms]"),
    float(FieldKey::HeatIndex, "Heat Index [C]"),
    float(FieldKey::DewPoint, "Dew Point [C]"),
    integer(FieldKey::Pm1_0, "PM1.0 [ug/m3]"),
    integer(FieldKey::Pm2_5, "PM2.5 [ug/m3]"),
    integer(FieldKey::Pm10_0, "PM10.0 [ug/m3]"),
    integer(FieldKey::ParticlesGt0_3, ">0.3 [um/0.1L]"),
    integer(FieldKey::ParticlesGt0_5, ">0.5 [um/0.1L]"),
    integer(FieldKey::ParticlesGt1_0, ">1.0 [um/0.1L]"),
    integer(FieldKey::ParticlesGt2_5, ">2.5 [um/0.1L]"),
    integer(FieldKey::ParticlesGt5_0, ">5.0 [um/0.1L]"),
    integer(FieldKey::ParticlesGt10_0, ">10.0 [um/0.1L]"),
    integer(FieldKey::AirQualityIndex, "AQI"),
    float(FieldKey::LightVisible, "Light (visible)"),
    float(FieldKey::LightIr, "Light (IR)"),
    float(FieldKey::LightUv, "Light (UV)"),
    integer(FieldKey::UvIndex, "UV-Index"),
    float(FieldKey::BatteryVoltage, "Battery [V]"),
];

impl FieldKey {
    /// Position of this key in [`SCHEMA`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Schema entry for this key.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &SCHEMA[self.index()]
    }

    /// Human-readable label used in the log header and the payload.
    #[must_use]
    pub fn label(self) -> &'static str {
        self.spec().label
    }
}

/// Header row cells, in column order.
pub fn header() -> impl Iterator<Item = &'static str> {
    std::iter::once(TIMESTAMP_LABEL).chain(SCHEMA.iter().map(|spec| spec.label))
}
