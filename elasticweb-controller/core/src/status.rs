use crate::k8s::{ElasticWeb, ElasticWebStatus};

/// The throughput `replicas` instances sustain, or `None` on overflow.
pub fn capacity(single_pod_capacity: i32, replicas: i32) -> Option<i32> {
    single_pod_capacity.checked_mul(replicas)
}

pub fn observed_capacity(web: &ElasticWeb) -> Option<i32> {
    web.status.as_ref().and_then(|s| s.observed_capacity)
}

/// Records `capacity` on the status, creating the status if it was unset.
pub fn set_observed_capacity(web: &mut ElasticWeb, capacity: i32) {
    web.status
        .get_or_insert_with(ElasticWebStatus::default)
        .observed_capacity = Some(capacity);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_overflow() {
        assert_eq!(capacity(100, 3), Some(300));
        assert_eq!(capacity(100, 0), Some(0));
        assert_eq!(capacity(1000, i32::MAX / 10), None);
    }

    #[test]
    fn initializes_unset_status() {
        let mut web = ElasticWeb::new("web", Default::default());
        assert_eq!(observed_capacity(&web), None);

        set_observed_capacity(&mut web, 300);
        assert_eq!(observed_capacity(&web), Some(300));

        set_observed_capacity(&mut web, 0);
        assert_eq!(observed_capacity(&web), Some(0));
    }
}
