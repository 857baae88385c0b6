use crate::{
    request::{MetadataField, OutResponse, Version},
    Digest, PushPlan,
};

/// Response for pushed tags, the primary tag becomes the version
pub fn report(plan: &PushPlan, digest: &Digest, base_metadata: Vec<MetadataField>) -> OutResponse {
    let mut metadata = base_metadata;
    metadata.push(MetadataField::new("tags", &plan.labels().join(" ")));
    OutResponse {
        version: Version {
            tag: plan.primary().label().to_string(),
            digest: digest.to_string(),
        },
        metadata,
    }
}
