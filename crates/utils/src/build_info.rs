/// Build metadata captured by `build.rs`; git fields are absent outside a checkout.
pub(crate) struct BuildInfo {
    pub commit_sha1: Option<&'static str>,
    git_dirty: Option<&'static str>,
}

impl BuildInfo {
    pub fn is_dirty(&self) -> bool {
        matches!(self.git_dirty, Some("true"))
    }
}

pub(crate) const BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    git_dirty: option_env!("VERGEN_GIT_DIRTY"),
};
