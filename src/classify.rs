// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The boundary to the external service that classifies samples and suggests pad
//! layouts. The service answers in JSON; this module only parses and keeps results.

use std::{collections::BTreeMap, fmt, fs, path::Path, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pads::PadIndex;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service request failed: {0}")]
    Request(String),

    #[error("unable to parse service response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The kind of sample, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    DrumOneshot,
    MelodicOneshot,
    Loop,
    Multisample,
    Fx,
    #[serde(other)]
    Uncategorized,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::DrumOneshot => "DRUM_ONESHOT",
            Category::MelodicOneshot => "MELODIC_ONESHOT",
            Category::Loop => "LOOP",
            Category::Multisample => "MULTISAMPLE",
            Category::Fx => "FX",
            Category::Uncategorized => "UNCATEGORIZED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    pub category: Category,
    pub reason: String,
}

/// A single request to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    Classify { sample_names: Vec<String> },
    SuggestLayout { sample_names: Vec<String> },
}

/// A text-generation service. Responses are raw JSON text.
pub trait TextService: Send + Sync {
    fn request(&self, request: &ServiceRequest) -> Result<String, ServiceError>;
}

/// A service that answers every request with the same text.
pub struct StaticResponse {
    response: String,
}

impl StaticResponse {
    pub fn new(response: &str) -> StaticResponse {
        StaticResponse {
            response: response.to_string(),
        }
    }

    /// Answers with the contents of a file, e.g. a response saved from the service.
    pub fn from_file(path: &Path) -> Result<StaticResponse, ServiceError> {
        let response = fs::read_to_string(path).map_err(|e| {
            ServiceError::Request(format!("unable to read {}: {}", path.display(), e))
        })?;
        Ok(StaticResponse { response })
    }
}

impl TextService for StaticResponse {
    fn request(&self, _: &ServiceRequest) -> Result<String, ServiceError> {
        Ok(self.response.clone())
    }
}

/// Parses a classification response. Empty text is an empty result.
pub fn parse_classifications(text: &str) -> Result<Vec<Classification>, ServiceError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(text)?)
}

/// A suggested sample for each pad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadLayout {
    pads: BTreeMap<PadIndex, String>,
}

impl PadLayout {
    pub fn get(&self, pad: PadIndex) -> Option<&str> {
        self.pads.get(&pad).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PadIndex, &str)> {
        self.pads.iter().map(|(pad, name)| (*pad, name.as_str()))
    }
}

impl IntoIterator for PadLayout {
    type Item = (PadIndex, String);
    type IntoIter = std::collections::btree_map::IntoIter<PadIndex, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.pads.into_iter()
    }
}

/// Parses a layout response. Keys that aren't pads 1-16 are dropped.
pub fn parse_layout(text: &str) -> Result<PadLayout, ServiceError> {
    if text.trim().is_empty() {
        return Ok(PadLayout::default());
    }

    let raw: BTreeMap<String, String> = serde_json::from_str(text)?;
    let pads = raw
        .into_iter()
        .filter_map(|(key, name)| match key.parse::<PadIndex>() {
            Ok(pad) => Some((pad, name)),
            Err(e) => {
                warn!(err = e.to_string(), "Dropping layout entry.");
                None
            }
        })
        .collect();
    Ok(PadLayout { pads })
}

/// Keeps the latest classification results. A failed request keeps the previous
/// results.
pub struct Classifier {
    service: Arc<dyn TextService>,
    results: RwLock<Vec<Classification>>,
}

impl Classifier {
    pub fn new(service: Arc<dyn TextService>) -> Classifier {
        Classifier {
            service,
            results: RwLock::new(Vec::new()),
        }
    }

    /// Classifies the samples. Returns whether the results were replaced.
    pub fn classify(&self, sample_names: &[String]) -> bool {
        let request = ServiceRequest::Classify {
            sample_names: sample_names.to_vec(),
        };
        match self
            .service
            .request(&request)
            .and_then(|text| parse_classifications(&text))
        {
            Ok(results) => {
                info!(count = results.len(), "Classified samples.");
                *self.results.write() = results;
                true
            }
            Err(e) => {
                warn!(err = e.to_string(), "Classification failed, keeping previous results.");
                false
            }
        }
    }

    pub fn results(&self) -> Vec<Classification> {
        self.results.read().clone()
    }

    /// Asks for a pad layout for the samples. Failures produce no layout.
    pub fn suggest_layout(&self, sample_names: &[String]) -> Option<PadLayout> {
        let request = ServiceRequest::SuggestLayout {
            sample_names: sample_names.to_vec(),
        };
        match self
            .service
            .request(&request)
            .and_then(|text| parse_layout(&text))
        {
            Ok(layout) => Some(layout),
            Err(e) => {
                warn!(err = e.to_string(), "Layout suggestion failed.");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Replies with each response in turn and records the requests.
    struct Scripted {
        responses: Mutex<Vec<Result<String, ServiceError>>>,
        requests: Mutex<Vec<ServiceRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, ServiceError>>) -> Arc<Scripted> {
            Arc::new(Scripted {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl TextService for Scripted {
        fn request(&self, request: &ServiceRequest) -> Result<String, ServiceError> {
            self.requests.lock().push(request.clone());
            self.responses.lock().remove(0)
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_parse_classifications() {
        let parsed = parse_classifications(
            r#"[
                {"name": "Kick_808.wav", "category": "DRUM_ONESHOT", "reason": "kick"},
                {"name": "Pad.wav", "category": "AMBIENT", "reason": "unknown"}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].category, Category::DrumOneshot);
        assert_eq!(parsed[1].category, Category::Uncategorized);
        assert_eq!(parsed[1].category.to_string(), "UNCATEGORIZED");

        assert!(parse_classifications("").unwrap().is_empty());
        assert!(matches!(
            parse_classifications("{\"name\": 1}"),
            Err(ServiceError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_layout_drops_invalid_pads() {
        let layout = parse_layout(
            r#"{"1": "Kick_808.wav", "5": "Snare_Trap.wav", "0": "Nope.wav", "17": "Nope.wav", "x": "Nope.wav"}"#,
        )
        .unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.get(PadIndex::new(1).unwrap()), Some("Kick_808.wav"));
        assert_eq!(layout.get(PadIndex::new(5).unwrap()), Some("Snare_Trap.wav"));
        assert!(parse_layout("[]").is_err());
    }

    #[test]
    fn test_failure_keeps_previous_results() {
        let service = Scripted::new(vec![
            Ok(r#"[{"name": "Loop.wav", "category": "LOOP", "reason": "bars"}]"#.to_string()),
            Err(ServiceError::Request("offline".to_string())),
            Ok("not json".to_string()),
        ]);
        let classifier = Classifier::new(service.clone());

        assert!(classifier.classify(&names(&["Loop.wav"])));
        assert!(!classifier.classify(&names(&["Other.wav"])));
        assert!(!classifier.classify(&names(&["Other.wav"])));
        assert_eq!(classifier.results().len(), 1);
        assert_eq!(classifier.results()[0].category, Category::Loop);

        assert_eq!(
            service.requests.lock()[0],
            ServiceRequest::Classify {
                sample_names: names(&["Loop.wav"])
            }
        );
    }

    #[test]
    fn test_suggest_layout() {
        let classifier = Classifier::new(Arc::new(StaticResponse::new(r#"{"2": "Hat.wav"}"#)));
        let layout = classifier.suggest_layout(&names(&["Hat.wav"])).unwrap();
        assert_eq!(
            layout.into_iter().collect::<Vec<_>>(),
            vec![(PadIndex::new(2).unwrap(), "Hat.wav".to_string())]
        );

        let failing = Classifier::new(Arc::new(StaticResponse::new("{")));
        assert!(failing.suggest_layout(&names(&["Hat.wav"])).is_none());
    }

    #[test]
    fn test_response_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, r#"{"16": "Crash.wav"}"#).unwrap();

        let service = StaticResponse::from_file(&path).unwrap();
        let layout = parse_layout(
            &service
                .request(&ServiceRequest::SuggestLayout {
                    sample_names: Vec::new(),
                })
                .unwrap(),
        )
        .unwrap();
        assert_eq!(layout.get(PadIndex::new(16).unwrap()), Some("Crash.wav"));

        assert!(StaticResponse::from_file(&dir.path().join("missing.json")).is_err());
    }
}
