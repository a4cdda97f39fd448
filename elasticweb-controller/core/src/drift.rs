use crate::k8s::{ContainerSpec, Deployment};

/// Rewrites the image of every live container whose declared namesake names a
/// different image, returning the names of the containers that changed.
///
/// Only images are reconciled. Containers that exist on one side only are
/// left as they are.
pub fn correct_images(deployment: &mut Deployment, declared: &[ContainerSpec]) -> Vec<String> {
    let Some(pod) = deployment
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
    else {
        return Vec::new();
    };

    let mut corrected = Vec::new();
    for live in pod.containers.iter_mut() {
        let Some(want) = declared.iter().find(|c| c.name == live.name) else {
            continue;
        };
        if live.image.as_deref() != Some(want.image.as_str()) {
            live.image = Some(want.image.clone());
            corrected.push(live.name.clone());
        }
    }
    corrected
}
