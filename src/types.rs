// src/types.rs
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const CHANNEL_COUNT: usize = 6;

/// The six motion axes in their fixed storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    AccX,
    AccY,
    AccZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::AccX,
        ChannelId::AccY,
        ChannelId::AccZ,
        ChannelId::GyroX,
        ChannelId::GyroY,
        ChannelId::GyroZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_accelerometer(self) -> bool {
        matches!(self, ChannelId::AccX | ChannelId::AccY | ChannelId::AccZ)
    }

    /// Short prefix used in feature names, e.g. `acc_x`.
    pub fn short_name(self) -> &'static str {
        match self {
            ChannelId::AccX => "acc_x",
            ChannelId::AccY => "acc_y",
            ChannelId::AccZ => "acc_z",
            ChannelId::GyroX => "gyro_x",
            ChannelId::GyroY => "gyro_y",
            ChannelId::GyroZ => "gyro_z",
        }
    }
}

/// Activity vocabulary of the classifier output (UCI-HAR classes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    Walking,
    WalkingUpstairs,
    WalkingDownstairs,
    Sitting,
    Standing,
    Laying,
}

// Raw model labels come either as names or as the dataset's 1-based class ids.
static ACTIVITY_ALIASES: Lazy<HashMap<&'static str, Activity>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (id, name, activity) in [
        ("1", "walking", Activity::Walking),
        ("2", "walking_upstairs", Activity::WalkingUpstairs),
        ("3", "walking_downstairs", Activity::WalkingDownstairs),
        ("4", "sitting", Activity::Sitting),
        ("5", "standing", Activity::Standing),
        ("6", "laying", Activity::Laying),
    ] {
        map.insert(id, activity);
        map.insert(name, activity);
    }
    map.insert("lying", Activity::Laying);
    map
});

impl Activity {
    pub fn as_str(self) -> &'static str {
        match self {
            Activity::Walking => "WALKING",
            Activity::WalkingUpstairs => "WALKING_UPSTAIRS",
            Activity::WalkingDownstairs => "WALKING_DOWNSTAIRS",
            Activity::Sitting => "SITTING",
            Activity::Standing => "STANDING",
            Activity::Laying => "LAYING",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActivity(pub String);

impl fmt::Display for UnknownActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown activity label `{}`", self.0)
    }
}

impl std::error::Error for UnknownActivity {}

impl FromStr for Activity {
    type Err = UnknownActivity;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        ACTIVITY_ALIASES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| UnknownActivity(raw.to_owned()))
    }
}

/// Label produced for one window, keyed by the window's ending sample index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub window_end_index: u64,
    pub window_ordinal: u64,
    pub activity: Activity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Lifecycle of one stream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingSamples,
    WindowReady,
    Processing,
    Error,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (AwaitingSamples, WindowReady)
                | (WindowReady, Processing)
                | (Processing, AwaitingSamples)
                | (Processing, Error)
                | (AwaitingSamples, Closed)
                | (Error, Closed)
        )
    }
}

/// One line of the result log. Every variant is tagged so failures never look like results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkRecord {
    Classified(ClassificationResult),
    SampleDropped {
        sample_ordinal: u64,
        reason: String,
    },
    InferenceFailed {
        window_end_index: u64,
        window_ordinal: u64,
        reason: String,
    },
    SessionClosed {
        final_state: SessionState,
        samples_accepted: u64,
        samples_dropped: u64,
        windows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
