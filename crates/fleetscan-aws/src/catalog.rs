//! Public SSM parameters publishing the recommended EKS node images

use fleetscan_common::model::{OsFamily, PlatformVersion};

/// Parameter holding the recommended image id for a version and family
pub fn parameter_name(version: PlatformVersion, family: OsFamily) -> Option<String> {
    let name = match family {
        OsFamily::AmazonLinux2023 => format!(
            "/aws/service/eks/optimized-ami/{version}/amazon-linux-2023/x86_64/standard/recommended/image_id"
        ),
        OsFamily::AmazonLinux2 => {
            format!("/aws/service/eks/optimized-ami/{version}/amazon-linux-2/recommended/image_id")
        }
        OsFamily::Bottlerocket => {
            format!("/aws/service/bottlerocket/aws-k8s-{version}/x86_64/latest/image_id")
        }
        OsFamily::Ubuntu => format!(
            "/aws/service/canonical/ubuntu/eks/22.04/{version}/stable/current/amd64/hvm/ebs-gp2/ami-id"
        ),
        OsFamily::Unknown => return None,
    };
    Some(name)
}

/// Families probed when looking for the newest catalog version. AL2 stops
/// at 1.32, AL2023 covers everything after.
pub const PROBE_FAMILIES: [OsFamily; 2] = [OsFamily::AmazonLinux2023, OsFamily::AmazonLinux2];

/// Minor versions probed above the cluster's own
pub const PROBE_MINORS: u32 = 5;

/// Maximum names per `GetParameters` call
pub const GET_PARAMETERS_BATCH: usize = 10;

/// Parameter names to probe, with the version each one stands for
pub fn version_probes(from: PlatformVersion) -> Vec<(String, PlatformVersion)> {
    let mut probes = Vec::new();
    let mut version = from;
    for _ in 0..=PROBE_MINORS {
        for family in PROBE_FAMILIES {
            if let Some(name) = parameter_name(version, family) {
                probes.push((name, version));
            }
        }
        version = version.next_minor();
    }
    probes
}
