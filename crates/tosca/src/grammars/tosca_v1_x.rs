//! TOSCA Simple Profile 1.0–1.3 grammars. The entity model matured into
//! 2.0 without structural breaks, so these are thin shims over the 2.0
//! readers: the selector differs, legacy key spellings (`file`,
//! `namespace_prefix`) are tolerated by the shared readers, and each
//! version pins the shared normative profile.

use super::tosca_v2_0;
use crate::entity::EntityId;
use crate::fields::ReadCtx;
use crate::grammar::Grammar;
use crate::scriptlets::ScriptletNamespace;

fn read_root(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    (tosca_v2_0::GRAMMAR.read_root)(ctx, data)
}

fn read_file(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    (tosca_v2_0::GRAMMAR.read_file)(ctx, data)
}

fn register(urls: &resources::UrlContext, scriptlets: &mut ScriptletNamespace) {
    (tosca_v2_0::GRAMMAR.register)(urls, scriptlets);
}

macro_rules! simple_profile_grammar {
    ($name:ident, $grammar_name:literal, [$($version:literal),+ $(,)?]) => {
        pub static $name: Grammar = Grammar {
            name: $grammar_name,
            selector_key: "tosca_definitions_version",
            versions: &[$(($version, Some(tosca_v2_0::PROFILE_PATH)),)+],
            read_root,
            read_file,
            register,
        };
    };
}

simple_profile_grammar!(GRAMMAR_1_3, "tosca_v1_3", ["tosca_simple_yaml_1_3"]);
simple_profile_grammar!(GRAMMAR_1_2, "tosca_v1_2", ["tosca_simple_yaml_1_2"]);
simple_profile_grammar!(GRAMMAR_1_1, "tosca_v1_1", ["tosca_simple_yaml_1_1"]);
simple_profile_grammar!(GRAMMAR_1_0, "tosca_v1_0", ["tosca_simple_yaml_1_0"]);
