pub mod child;
pub mod clinic;
pub mod result;
pub mod session;

pub use child::{Age, Child, ChildDraft};
pub use clinic::{
    Appointment, AppointmentDraft, AppointmentStatus, Doctor, DoctorDraft, Stimulus,
    StimulusDraft,
};
pub use result::{GazeResult, ResultFetch, RiskLevel};
pub use session::{Ack, ActiveSession, SessionStatus, SessionType, StartSessionRequest};

/// Backend identifiers arrive as either JSON strings or integers depending on
/// the table they come from; both are normalized to `String`.
pub(crate) mod id_format {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    impl From<RawId> for String {
        fn from(raw: RawId) -> Self {
            match raw {
                RawId::Text(text) => text,
                RawId::Int(value) => value.to_string(),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawId::deserialize(deserializer).map_err(|_| {
            <D::Error as de::Error>::custom("expected identifier as string or integer")
        })?;
        Ok(raw.into())
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};

        use super::RawId;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<RawId> = Option::deserialize(deserializer)?;
            Ok(raw.map(String::from))
        }
    }
}
