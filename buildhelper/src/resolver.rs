//! Derives docker tags, image references and cache references from CI, git and environment state.
//!
//! Everything in here is total: missing metadata degrades to empty strings or placeholders and a
//! valid tag always comes out. CI metadata takes precedence over git metadata because it describes
//! the event that triggered the build, which can differ from the checked out working tree (CI
//! systems commonly check out a detached `HEAD`).

use constcat::concat;
use image_tag::{sanitize, truncate_str, ImageReference, Tag, LATEST};
use log::debug;

use crate::{
    ci::CiProvider,
    env::Env,
    git::{self, GitProvider},
    registry::Registry,
};

pub const DOCKER_REPOSITORY: &str = "DOCKER_REPOSITORY";
pub const DOCKER_CACHE_REPOSITORY: &str = "DOCKER_CACHE_REPOSITORY";
pub const DOCKER_LATEST_BRANCH: &str = "DOCKER_LATEST_BRANCH";
pub const DOCKER_TAG_PREFIX: &str = "DOCKER_TAG_PREFIX";
pub const DOCKER_TAG_SUFFIX: &str = "DOCKER_TAG_SUFFIX";
pub const DOCKER_MUTABLE_TAGS: &str = "DOCKER_MUTABLE_TAGS";

pub const DEFAULT_LATEST_BRANCH: &str = "master";
pub const UNKNOWN_REPOSITORY: &str = "unknown/unknown";

pub const LATEST_BRANCH_HELP: &str = concat!(
    "The branch whose builds are tagged `latest`, read from `",
    DOCKER_LATEST_BRANCH,
    "` (default `",
    DEFAULT_LATEST_BRANCH,
    "`)."
);

/// Leaves room for `-<ci name>.<id>-<short sha>` within the 128 character tag limit.
const MAX_BRANCH_LEN: usize = 60;
const SHORT_SHA_LEN: usize = 7;

/// The ref being built. CI wins over git.
pub fn resolve_git_ref(ci: &dyn CiProvider, git: &dyn GitProvider) -> String {
    match ci.git_ref() {
        "" => git.git_ref(),
        value => value.to_owned(),
    }
}

/// The commit being built. CI wins over git.
pub fn resolve_git_sha(ci: &dyn CiProvider, git: &dyn GitProvider) -> String {
    match ci.git_sha() {
        "" => git.git_sha(),
        value => value.to_owned(),
    }
}

/// Computes the immutable tag of the image being built.
///
/// A tag ref like `refs/tags/v1.2.3` yields `1.2.3`, wrapped in `DOCKER_TAG_PREFIX` and
/// `DOCKER_TAG_SUFFIX`. Anything else yields `<branch>-<ci name>.<incremental id>-<short sha>`.
/// The assembled string is sanitized once, at the end.
pub fn resolve_tag(ci: &dyn CiProvider, git: &dyn GitProvider, env: &Env) -> Tag {
    let git_ref = resolve_git_ref(ci, git);

    if let Some(name) = git::tag_name(&git_ref) {
        let name = name.strip_prefix('v').unwrap_or(name);
        return sanitize(&format!(
            "{prefix}{name}{suffix}",
            prefix = env.get(DOCKER_TAG_PREFIX),
            suffix = env.get(DOCKER_TAG_SUFFIX),
        ));
    }

    let branch = truncate_str(git::branch_name(&git_ref), MAX_BRANCH_LEN);
    let sha = resolve_git_sha(ci, git);
    sanitize(&format!(
        "{branch}-{name}.{id}-{sha}",
        name = ci.name(),
        id = ci.incremental_id(),
        sha = truncate_str(&sha, SHORT_SHA_LEN),
    ))
}

/// Picks the image repository: `DOCKER_REPOSITORY`, then the CI repository, then the `origin`
/// remote, then [`UNKNOWN_REPOSITORY`].
pub fn resolve_repository(ci: &dyn CiProvider, git: &dyn GitProvider, env: &Env) -> String {
    let explicit = env.get(DOCKER_REPOSITORY);
    if !explicit.is_empty() {
        return explicit.to_owned();
    }
    let from_ci = ci.git_repository();
    if !from_ci.is_empty() {
        return from_ci.to_owned();
    }
    let from_git = git.remote_repository();
    if !from_git.is_empty() {
        return from_git;
    }
    UNKNOWN_REPOSITORY.to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Shared by every build of the latest branch.
    Latest,
    /// Shared by every build of one branch.
    Branch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTag {
    pub kind: CacheKind,
    pub tag: Tag,
}

/// Computes the tags under which build cache is stored, rendered as
/// `cache-<repository>-<suffix>`.
///
/// `latest` is included when `branch` is the latest branch or when `force_include_latest` is set,
/// which is useful when importing cache because a stale `latest` cache is still better than
/// none. The branch itself is included unless it is empty or literally `latest`. The `latest`
/// entry always comes first and no tag appears twice.
pub fn cache_tags(
    branch: &str,
    latest_branch: &str,
    repository: &str,
    force_include_latest: bool,
) -> Vec<CacheTag> {
    let render = |suffix: &str| sanitize(&format!("cache-{repository}-{suffix}"));

    let mut tags = Vec::with_capacity(2);
    if force_include_latest || branch == latest_branch {
        tags.push(CacheTag {
            kind: CacheKind::Latest,
            tag: render(LATEST),
        });
    }
    if !branch.is_empty() && branch != LATEST {
        let tag = render(branch);
        if tags.iter().all(|existing| existing.tag != tag) {
            tags.push(CacheTag {
                kind: CacheKind::Branch,
                tag,
            });
        }
    }
    tags
}

/// Picks the single tag to export cache to. `docker buildx` accepts only one registry cache
/// exporter. The `latest` tag wins over the branch tag so the latest branch keeps the shared cache
/// warm.
pub fn export_cache_tag(tags: &[CacheTag]) -> Option<&CacheTag> {
    tags.iter()
        .find(|tag| tag.kind == CacheKind::Latest)
        .or_else(|| tags.first())
}

/// Resolves everything needed to tag, build and cache an image. Each method queries the providers
/// again; nothing is cached.
pub struct Resolver<'a> {
    env: &'a Env,
    ci: &'a dyn CiProvider,
    git: &'a dyn GitProvider,
    registry: &'a dyn Registry,
    cache_registry: &'a dyn Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(
        env: &'a Env,
        ci: &'a dyn CiProvider,
        git: &'a dyn GitProvider,
        registry: &'a dyn Registry,
    ) -> Self {
        Self {
            env,
            ci,
            git,
            registry,
            cache_registry: registry,
        }
    }

    /// Stores cache in a different registry than the images.
    pub fn with_cache_registry(mut self, cache_registry: &'a dyn Registry) -> Self {
        self.cache_registry = cache_registry;
        self
    }

    pub fn env(&self) -> &'a Env {
        self.env
    }

    pub fn ci(&self) -> &'a dyn CiProvider {
        self.ci
    }

    pub fn git_ref(&self) -> String {
        resolve_git_ref(self.ci, self.git)
    }

    pub fn git_sha(&self) -> String {
        resolve_git_sha(self.ci, self.git)
    }

    /// The branch being built, or an empty string when building a tag.
    pub fn branch(&self) -> String {
        let git_ref = self.git_ref();
        if git::tag_name(&git_ref).is_some() {
            String::new()
        } else {
            git::branch_name(&git_ref).to_owned()
        }
    }

    pub fn latest_branch(&self) -> &'a str {
        self.env.get_or(DOCKER_LATEST_BRANCH, DEFAULT_LATEST_BRANCH)
    }

    pub fn tag(&self) -> Tag {
        let tag = resolve_tag(self.ci, self.git, self.env);
        debug!("resolved tag: {tag}");
        tag
    }

    pub fn repository(&self) -> String {
        resolve_repository(self.ci, self.git, self.env)
    }

    /// `DOCKER_CACHE_REPOSITORY`, falling back to the image repository.
    pub fn cache_repository(&self) -> String {
        match self.env.get(DOCKER_CACHE_REPOSITORY) {
            "" => self.repository(),
            value => value.to_owned(),
        }
    }

    pub fn registry_host(&self) -> String {
        self.registry.container_registry_host()
    }

    pub fn cache_registry_host(&self) -> String {
        self.cache_registry.container_registry_host()
    }

    /// The fully qualified reference of the image being built.
    pub fn image(&self) -> ImageReference<'static> {
        ImageReference::new(self.registry_host(), self.repository(), self.tag())
    }

    /// Tags that later builds overwrite. Empty unless `DOCKER_MUTABLE_TAGS` is `true`.
    pub fn mutable_tags(&self) -> Vec<Tag> {
        if !self.env.is_true(DOCKER_MUTABLE_TAGS) {
            return Vec::new();
        }
        let branch = self.branch();
        let mut tags = Vec::with_capacity(2);
        // `latest` only ever comes from the latest branch.
        if !branch.is_empty() && branch != LATEST {
            tags.push(sanitize(&branch));
        }
        if branch == self.latest_branch() && !tags.iter().any(Tag::is_latest) {
            tags.push(Tag::latest());
        }
        tags
    }

    /// The immutable image reference followed by the mutable ones, without duplicates.
    pub fn image_references(&self) -> Vec<ImageReference<'static>> {
        let image = self.image();
        let mut references = vec![image.clone()];
        for tag in self.mutable_tags() {
            if references.iter().all(|reference| *reference.tag() != tag) {
                references.push(image.with_tag(tag));
            }
        }
        references
    }

    pub fn cache_tags(&self, force_include_latest: bool) -> Vec<CacheTag> {
        cache_tags(
            &self.branch(),
            self.latest_branch(),
            &self.repository(),
            force_include_latest,
        )
    }

    fn cache_reference(&self, tag: Tag) -> ImageReference<'static> {
        ImageReference::new(self.cache_registry_host(), self.cache_repository(), tag)
    }

    /// References to import cache from. Always includes `latest`.
    pub fn cache_from(&self) -> Vec<ImageReference<'static>> {
        self.cache_tags(true)
            .into_iter()
            .map(|cache_tag| self.cache_reference(cache_tag.tag))
            .collect()
    }

    /// The single reference to export cache to.
    pub fn cache_to(&self) -> Option<ImageReference<'static>> {
        let tags = self.cache_tags(false);
        export_cache_tag(&tags).map(|cache_tag| self.cache_reference(cache_tag.tag.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LocalRegistry;

    #[derive(Default)]
    struct FakeCi {
        incremental_id: &'static str,
        git_ref: &'static str,
        git_sha: &'static str,
        git_repository: &'static str,
        name: &'static str,
    }

    impl CiProvider for FakeCi {
        fn incremental_id(&self) -> &str {
            self.incremental_id
        }
        fn git_ref(&self) -> &str {
            self.git_ref
        }
        fn git_sha(&self) -> &str {
            self.git_sha
        }
        fn git_repository(&self) -> &str {
            self.git_repository
        }
        fn name(&self) -> &str {
            self.name
        }
    }

    #[derive(Default)]
    struct FakeGit {
        git_ref: &'static str,
        git_sha: &'static str,
        remote_repository: &'static str,
    }

    impl GitProvider for FakeGit {
        fn git_ref(&self) -> String {
            self.git_ref.to_owned()
        }
        fn git_sha(&self) -> String {
            self.git_sha.to_owned()
        }
        fn remote_repository(&self) -> String {
            self.remote_repository.to_owned()
        }
    }

    struct FakeRegistry(&'static str);

    impl Registry for FakeRegistry {
        fn container_registry_host(&self) -> String {
            self.0.to_owned()
        }
        fn login(&self) -> crate::Result<()> {
            Ok(())
        }
    }

    fn github_ci(git_ref: &'static str) -> FakeCi {
        FakeCi {
            incremental_id: "123",
            git_ref,
            git_sha: "deadbeaf",
            git_repository: "cresta/project",
            name: "gh",
        }
    }

    #[test]
    fn branch_tag_is_composite() {
        let ci = github_ci("refs/heads/hotfix/fix-wrong-sha");
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "hotfix_fix-wrong-sha-gh.123-deadbea");
    }

    #[test]
    fn bare_branch_ref_passes_through() {
        let ci = github_ci("hotfix/fix-wrong-sha");
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "hotfix_fix-wrong-sha-gh.123-deadbea");
    }

    #[test]
    fn version_tag_strips_prefix_and_v() {
        let ci = github_ci("refs/tags/v1.2.3");
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "1.2.3");

        let ci = github_ci("refs/tags/release-7");
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "release-7");

        // Only one `v` is dropped.
        let ci = github_ci("refs/tags/vv2");
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "v2");
    }

    #[test]
    fn version_tag_is_wrapped() {
        let env = Env::default()
            .with(DOCKER_TAG_PREFIX, "app-")
            .with(DOCKER_TAG_SUFFIX, "+debug");
        let tag = resolve_tag(&github_ci("refs/tags/v1.2.3"), &FakeGit::default(), &env);
        assert_eq!(tag.as_str(), "app-1.2.3_debug");

        // The wrapping applies to version tags only.
        let tag = resolve_tag(&github_ci("refs/heads/main"), &FakeGit::default(), &env);
        assert_eq!(tag.as_str(), "main-gh.123-deadbea");
    }

    #[test]
    fn empty_version_tag_is_latest() {
        let tag = resolve_tag(&github_ci("refs/tags/v"), &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "latest");
    }

    #[test]
    fn git_is_the_fallback_for_ci() {
        let ci = FakeCi {
            incremental_id: "0",
            name: "local",
            ..Default::default()
        };
        let git = FakeGit {
            git_ref: "refs/heads/feature",
            git_sha: "0123456789abcdef",
            remote_repository: "owner/project",
        };
        assert_eq!(
            resolve_tag(&ci, &git, &Env::default()).as_str(),
            "feature-local.0-0123456"
        );
        assert_eq!(
            resolve_repository(&ci, &git, &Env::default()),
            "owner/project"
        );
    }

    #[test]
    fn ci_wins_over_git() {
        let ci = github_ci("refs/heads/ci-branch");
        let git = FakeGit {
            git_ref: "refs/heads/local-branch",
            git_sha: "ffffffffff",
            remote_repository: "git/repo",
        };
        assert_eq!(resolve_git_ref(&ci, &git), "refs/heads/ci-branch");
        assert_eq!(resolve_git_sha(&ci, &git), "deadbeaf");
        assert_eq!(
            resolve_tag(&ci, &git, &Env::default()).as_str(),
            "ci-branch-gh.123-deadbea"
        );
        assert_eq!(
            resolve_repository(&ci, &git, &Env::default()),
            "cresta/project"
        );
    }

    #[test]
    fn empty_metadata_still_yields_a_tag() {
        let tag = resolve_tag(&FakeCi::default(), &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), "_-.-");
        assert!(image_tag::is_valid_tag(&tag));
    }

    #[test]
    fn long_branch_is_truncated() {
        let ci = FakeCi {
            git_ref: Box::leak(format!("refs/heads/{}", "b".repeat(200)).into_boxed_str()),
            git_sha: "0123456789",
            incremental_id: "99",
            name: "gh",
            ..Default::default()
        };
        let tag = resolve_tag(&ci, &FakeGit::default(), &Env::default());
        assert_eq!(tag.as_str(), format!("{}-gh.99-0123456", "b".repeat(60)));
    }

    #[test]
    fn repository_precedence() {
        let git = FakeGit {
            remote_repository: "git/repo",
            ..Default::default()
        };
        let env = Env::default().with(DOCKER_REPOSITORY, "explicit/repo");
        assert_eq!(
            resolve_repository(&github_ci(""), &git, &env),
            "explicit/repo"
        );
        assert_eq!(
            resolve_repository(&FakeCi::default(), &FakeGit::default(), &Env::default()),
            UNKNOWN_REPOSITORY
        );
    }

    #[test]
    fn cache_tags_on_latest_branch() {
        let tags = cache_tags("master", "master", "cresta/project", false);
        assert_eq!(
            tags,
            [
                CacheTag {
                    kind: CacheKind::Latest,
                    tag: sanitize("cache-cresta_project-latest"),
                },
                CacheTag {
                    kind: CacheKind::Branch,
                    tag: sanitize("cache-cresta_project-master"),
                },
            ]
        );
    }

    #[test]
    fn cache_tags_on_other_branch() {
        let tags = cache_tags("feature/x", "master", "org/repo", false);
        assert_eq!(
            tags,
            [CacheTag {
                kind: CacheKind::Branch,
                tag: sanitize("cache-org_repo-feature_x"),
            }]
        );

        let forced = cache_tags("feature/x", "master", "org/repo", true);
        assert_eq!(forced.len(), 2);
        assert_eq!(forced[0].kind, CacheKind::Latest);
        assert_eq!(forced[1].kind, CacheKind::Branch);
    }

    #[test]
    fn cache_tags_skip_empty_and_literal_latest_branch() {
        assert!(cache_tags("", "master", "org/repo", false).is_empty());
        assert_eq!(
            cache_tags("", "master", "org/repo", true)
                .into_iter()
                .map(|tag| tag.kind)
                .collect::<Vec<_>>(),
            [CacheKind::Latest]
        );
        assert_eq!(
            cache_tags("latest", "latest", "org/repo", false)
                .into_iter()
                .map(|tag| tag.tag.to_string())
                .collect::<Vec<_>>(),
            ["cache-org_repo-latest"]
        );
    }

    #[test]
    fn cache_tags_never_repeat() {
        // Both tags get cut to the same 128 characters.
        let repository = "r".repeat(200);
        let tags = cache_tags("master", "master", &repository, true);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, CacheKind::Latest);
    }

    #[test]
    fn export_prefers_latest() {
        let tags = cache_tags("master", "master", "org/repo", false);
        assert_eq!(export_cache_tag(&tags).unwrap().kind, CacheKind::Latest);

        let tags = cache_tags("feature", "master", "org/repo", false);
        assert_eq!(export_cache_tag(&tags).unwrap().kind, CacheKind::Branch);

        // Precedence does not depend on order.
        let reversed = vec![
            CacheTag {
                kind: CacheKind::Branch,
                tag: sanitize("b"),
            },
            CacheTag {
                kind: CacheKind::Latest,
                tag: sanitize("l"),
            },
        ];
        assert_eq!(export_cache_tag(&reversed).unwrap().tag.as_str(), "l");

        assert_eq!(export_cache_tag(&[]), None);
    }

    #[test]
    fn image_reference_includes_registry() {
        let env = Env::default();
        let ci = github_ci("refs/tags/v2.0.0");
        let git = FakeGit::default();
        let registry = FakeRegistry("ghcr.io");
        let resolver = Resolver::new(&env, &ci, &git, &registry);
        assert_eq!(resolver.image().to_string(), "ghcr.io/cresta/project:2.0.0");
    }

    #[test]
    fn image_reference_omits_empty_registry() {
        let env = Env::default();
        let ci = github_ci("refs/tags/v2.0.0");
        let git = FakeGit::default();
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.image().to_string(), "cresta/project:2.0.0");
    }

    #[test]
    fn branch_is_empty_for_tag_builds() {
        let env = Env::default();
        let git = FakeGit::default();

        let ci = github_ci("refs/tags/v2.0.0");
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.branch(), "");
        assert!(resolver.cache_to().is_none());

        let ci = github_ci("refs/heads/main");
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.branch(), "main");
    }

    #[test]
    fn cache_references_use_cache_registry_and_repository() {
        let env = Env::default()
            .with(DOCKER_CACHE_REPOSITORY, "shared/cache")
            .with(DOCKER_LATEST_BRANCH, "main");
        let ci = github_ci("refs/heads/main");
        let git = FakeGit::default();
        let registry = FakeRegistry("ghcr.io");
        let cache_registry = FakeRegistry("cache.example.com");
        let resolver =
            Resolver::new(&env, &ci, &git, &registry).with_cache_registry(&cache_registry);

        assert_eq!(
            resolver
                .cache_from()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            [
                "cache.example.com/shared/cache:cache-cresta_project-latest",
                "cache.example.com/shared/cache:cache-cresta_project-main",
            ]
        );
        assert_eq!(
            resolver.cache_to().unwrap().to_string(),
            "cache.example.com/shared/cache:cache-cresta_project-latest"
        );
    }

    #[test]
    fn cache_from_always_reads_latest() {
        let env = Env::default();
        let ci = github_ci("refs/heads/feature");
        let git = FakeGit::default();
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);

        assert_eq!(
            resolver
                .cache_from()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            [
                "cresta/project:cache-cresta_project-latest",
                "cresta/project:cache-cresta_project-feature",
            ]
        );
        assert_eq!(
            resolver.cache_to().unwrap().to_string(),
            "cresta/project:cache-cresta_project-feature"
        );
    }

    #[test]
    fn mutable_tags_are_opt_in() {
        let ci = github_ci("refs/heads/master");
        let git = FakeGit::default();

        let env = Env::default();
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert!(resolver.mutable_tags().is_empty());
        assert_eq!(resolver.image_references().len(), 1);

        let env = Env::default().with(DOCKER_MUTABLE_TAGS, "true");
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(
            resolver
                .image_references()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            [
                "cresta/project:master-gh.123-deadbea",
                "cresta/project:master",
                "cresta/project:latest",
            ]
        );
    }

    #[test]
    fn mutable_tags_for_feature_branch_and_tag_builds() {
        let env = Env::default().with(DOCKER_MUTABLE_TAGS, "true");
        let git = FakeGit::default();

        let ci = github_ci("refs/heads/feature/x");
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.mutable_tags(), [sanitize("feature_x")]);

        let ci = github_ci("refs/tags/v1.0.0");
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert!(resolver.mutable_tags().is_empty());
    }

    #[test]
    fn latest_branch_named_latest_is_tagged_once() {
        let env = Env::default()
            .with(DOCKER_MUTABLE_TAGS, "true")
            .with(DOCKER_LATEST_BRANCH, "latest");
        let ci = github_ci("refs/heads/latest");
        let git = FakeGit::default();
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.mutable_tags(), [Tag::latest()]);
    }

    #[test]
    fn branch_named_latest_does_not_publish_latest() {
        let env = Env::default().with(DOCKER_MUTABLE_TAGS, "true");
        let ci = github_ci("refs/heads/latest");
        let git = FakeGit::default();
        let resolver = Resolver::new(&env, &ci, &git, &LocalRegistry);
        assert_eq!(resolver.latest_branch(), DEFAULT_LATEST_BRANCH);
        assert!(resolver.mutable_tags().is_empty());
        assert_eq!(resolver.image_references(), [resolver.image()]);
    }
}
