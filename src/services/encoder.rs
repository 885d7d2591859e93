use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        questionnaire::SELECTION_SEPARATOR, FeatureVector, LabelMetadata, ProfileFeatures,
        QuestionnaireResponse,
    },
};

/// Categorical features in the order the model reads them.
///
/// Vacation types are not in this list; they form the multi-hot segment
/// that follows the categorical indices.
pub const CATEGORICAL_FEATURES: [&str; 6] = [
    "origin_country",
    "seasons",
    "budget",
    "favorite_country_visited",
    "travel_distance",
    "place_type",
];

/// Index emitted for an answer with no entry in the feature's class list
pub const UNSEEN_LABEL: i64 = -1;

/// Encodes questionnaire answers into the model's query vector
///
/// Holds an immutable snapshot of the label metadata fetched from the
/// recommendation service; encoding is a pure function of that snapshot and
/// the answers.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    metadata: Arc<LabelMetadata>,
}

impl FeatureEncoder {
    pub fn new(metadata: Arc<LabelMetadata>) -> Self {
        Self { metadata }
    }

    /// Length of every vector this encoder produces
    pub fn vector_len(&self) -> usize {
        CATEGORICAL_FEATURES.len() + self.metadata.vacation_types.len()
    }

    pub fn encode(&self, response: &QuestionnaireResponse) -> AppResult<FeatureVector> {
        self.encode_features(&response.features())
    }

    pub fn encode_features(&self, features: &ProfileFeatures) -> AppResult<FeatureVector> {
        if self.metadata.is_empty() {
            return Err(AppError::MetadataNotReady);
        }

        let categorical = CATEGORICAL_FEATURES
            .iter()
            .map(|feature| {
                let value = features.categorical(feature).unwrap_or_default().trim();
                self.categorical_index(feature, value)
            })
            .collect();

        let vacation_types = self.multi_hot(&features.vacation_types);

        Ok(FeatureVector {
            categorical,
            vacation_types,
        })
    }

    fn categorical_index(&self, feature: &str, value: &str) -> i64 {
        let index = self
            .metadata
            .label_mappings
            .get(feature)
            .and_then(|classes| classes.iter().position(|class| class == value));

        match index {
            Some(index) => index as i64,
            None => {
                tracing::warn!(
                    feature = %feature,
                    value = %value,
                    "Unseen label, encoding as sentinel"
                );
                UNSEEN_LABEL
            }
        }
    }

    fn multi_hot(&self, joined: &str) -> Vec<i64> {
        let vocabulary = &self.metadata.vacation_types;
        let mut encoded = vec![0; vocabulary.len()];

        for selection in joined
            .split(SELECTION_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            match vocabulary.iter().position(|vt| vt == selection) {
                Some(index) => encoded[index] = 1,
                None => tracing::debug!(
                    vacation_type = %selection,
                    "Vacation type not in vocabulary, dropped"
                ),
            }
        }

        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::questionnaire::tests::sample_response;
    use crate::models::{questionnaire, Answer};
    use std::collections::HashMap;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn metadata() -> LabelMetadata {
        let mut label_mappings = HashMap::new();
        label_mappings.insert(
            "origin_country".to_string(),
            strings(&["Brazil", "Canada", "France"]),
        );
        label_mappings.insert(
            "seasons".to_string(),
            strings(&["Fall", "Spring", "Summer", "Winter"]),
        );
        label_mappings.insert(
            "budget".to_string(),
            strings(&["Budget Friendly", "Mid-Range", "Luxury", "Premium"]),
        );
        label_mappings.insert(
            "favorite_country_visited".to_string(),
            strings(&["Italy", "Japan"]),
        );
        label_mappings.insert(
            "travel_distance".to_string(),
            strings(&["Anywhere", "Within your Country"]),
        );
        label_mappings.insert(
            "place_type".to_string(),
            strings(&["Busy", "Moderate", "Quiet"]),
        );

        LabelMetadata {
            label_mappings,
            vacation_types: strings(&[
                "Beach",
                "City",
                "Historical",
                "Adventure",
                "Nature",
                "Religious",
            ]),
        }
    }

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::new(Arc::new(metadata()))
    }

    #[test]
    fn test_encode_known_labels_uses_class_index() {
        let vector = encoder().encode(&sample_response()).unwrap();
        // Canada, Summer, Luxury, Japan, Anywhere, Quiet
        assert_eq!(vector.categorical, vec![1, 2, 2, 1, 0, 2]);
        // Beach, Nature
        assert_eq!(vector.vacation_types, vec![1, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn test_budget_luxury_encodes_to_two() {
        let mut label_mappings = HashMap::new();
        label_mappings.insert(
            "budget".to_string(),
            strings(&["Budget Friendly", "Mid-Range", "Luxury", "Premium"]),
        );
        let encoder = FeatureEncoder::new(Arc::new(LabelMetadata {
            label_mappings,
            vacation_types: vec![],
        }));

        let features = ProfileFeatures {
            budget: "Luxury".to_string(),
            ..Default::default()
        };
        let vector = encoder.encode_features(&features).unwrap();
        assert_eq!(vector.categorical[2], 2);
        // Features without a class list fall back to the sentinel
        assert_eq!(vector.categorical[0], UNSEEN_LABEL);
    }

    #[test]
    fn test_answers_are_trimmed_before_lookup() {
        let mut response = sample_response();
        response.set(
            questionnaire::ORIGIN_COUNTRY,
            Answer::Text("  France \n".to_string()),
        );
        let vector = encoder().encode(&response).unwrap();
        assert_eq!(vector.categorical[0], 2);
    }

    #[test]
    fn test_unseen_label_encodes_sentinel() {
        let mut response = sample_response();
        response.set(
            questionnaire::ORIGIN_COUNTRY,
            Answer::Text("Atlantis".to_string()),
        );
        let vector = encoder().encode(&response).unwrap();
        assert_eq!(vector.categorical[0], UNSEEN_LABEL);
        assert_eq!(vector.categorical[1], 2);
    }

    #[test]
    fn test_multiple_seasons_join_to_an_unseen_label() {
        let mut response = sample_response();
        response.set(
            questionnaire::SEASONS,
            Answer::Selections(strings(&["Spring", "Summer"])),
        );
        let vector = encoder().encode(&response).unwrap();
        assert_eq!(vector.categorical[1], UNSEEN_LABEL);
    }

    #[test]
    fn test_multi_hot_marks_every_selected_type() {
        let encoder = encoder();
        let vocabulary = metadata().vacation_types;

        // Every subset of the vocabulary
        for mask in 0u32..(1 << vocabulary.len()) {
            let selected: Vec<&str> = vocabulary
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, vt)| vt.as_str())
                .collect();

            let features = ProfileFeatures {
                vacation_types: selected.join("|"),
                ..Default::default()
            };
            let vector = encoder.encode_features(&features).unwrap();

            let ones = vector.vacation_types.iter().filter(|v| **v == 1).count();
            assert_eq!(ones, selected.len());
            for (i, value) in vector.vacation_types.iter().enumerate() {
                let expected = if mask & (1 << i) != 0 { 1 } else { 0 };
                assert_eq!(*value, expected);
            }
        }
    }

    #[test]
    fn test_unknown_vacation_types_are_dropped() {
        let features = ProfileFeatures {
            vacation_types: "Beach|Skiing|City".to_string(),
            ..Default::default()
        };
        let vector = encoder().encode_features(&features).unwrap();
        assert_eq!(vector.vacation_types, vec![1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_vector_length_is_fixed() {
        let encoder = encoder();
        let expected = CATEGORICAL_FEATURES.len() + 6;
        assert_eq!(encoder.vector_len(), expected);

        let empty = encoder
            .encode(&QuestionnaireResponse::new())
            .unwrap()
            .to_query_vector();
        assert_eq!(empty.len(), expected);
        assert!(empty[..CATEGORICAL_FEATURES.len()]
            .iter()
            .all(|v| *v == UNSEEN_LABEL));

        let full = encoder.encode(&sample_response()).unwrap();
        assert_eq!(full.len(), expected);
    }

    #[test]
    fn test_empty_metadata_is_not_ready() {
        let encoder = FeatureEncoder::new(Arc::new(LabelMetadata::default()));
        let result = encoder.encode(&sample_response());
        assert!(matches!(result, Err(AppError::MetadataNotReady)));
    }
}
