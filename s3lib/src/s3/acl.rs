//! 预设的访问策略，通过`x-amz-acl`发送

use serde::Deserialize;
use std::fmt::{Display, Formatter};

pub const ACL_HEADER: &str = "x-amz-acl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl Display for CannedAcl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[test]
fn canned_acl_test() {
    assert_eq!(CannedAcl::default(), CannedAcl::Private);
    assert_eq!(CannedAcl::PublicReadWrite.to_string(), "public-read-write");

    #[derive(Deserialize)]
    struct Conf {
        acl: CannedAcl,
    }
    let conf: Conf = toml::from_str(r#"acl = "authenticated-read""#).unwrap();
    assert_eq!(conf.acl, CannedAcl::AuthenticatedRead);
}
