use crate::{cdr::CdrError, types::SensorKind};

/// Failures a caller must be able to tell apart.
///
/// Everything else travels as a plain [eyre::Report].
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("{sensor} topic '{topic}' has no messages in the log")]
    MissingTopic { sensor: SensorKind, topic: String },

    #[error("malformed record on topic '{topic}'")]
    MalformedRecord {
        topic: String,
        #[source]
        reason: CdrError,
    },
}

impl ReplayError {
    /// Process exit status associated with the error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplayError::MissingTopic {
                sensor: SensorKind::Imu,
                ..
            } => 2,
            ReplayError::MissingTopic {
                sensor: SensorKind::Camera,
                ..
            } => 3,
            ReplayError::MalformedRecord { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let imu = ReplayError::MissingTopic {
            sensor: SensorKind::Imu,
            topic: "/imu0".into(),
        };
        let cam = ReplayError::MissingTopic {
            sensor: SensorKind::Camera,
            topic: "/cam0/image_raw".into(),
        };
        let bad = ReplayError::MalformedRecord {
            topic: "/imu0".into(),
            reason: CdrError::Truncated {
                offset: 4,
                needed: 8,
            },
        };
        assert_eq!(imu.exit_code(), 2);
        assert_eq!(cam.exit_code(), 3);
        assert_eq!(bad.exit_code(), 1);
        assert_eq!(
            imu.to_string(),
            "imu topic '/imu0' has no messages in the log"
        );
    }

    #[test]
    fn test_downcast_through_report() {
        let report = eyre::Report::new(ReplayError::MissingTopic {
            sensor: SensorKind::Camera,
            topic: "/cam0".into(),
        })
        .wrap_err("while opening log");

        let code = report
            .downcast_ref::<ReplayError>()
            .map(ReplayError::exit_code);
        assert_eq!(code, Some(3));
    }
}
