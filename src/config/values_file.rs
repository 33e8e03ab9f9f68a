//! Values files supply root-module constants from the command line. A values
//! file is a standalone HCL document containing only top-level attributes.

use std::path::Path;

use indexmap::IndexMap;

use crate::config::Parser;
use crate::diag::{Diagnostic, Diagnostics, Subject};

impl Parser {
    /// Parses a sequence of values files and merges their attributes
    /// left-to-right, later files overriding earlier ones.
    pub fn parse_values_files(
        &mut self,
        paths: &[impl AsRef<Path>],
    ) -> (IndexMap<String, hcl::Expression>, Diagnostics) {
        let mut attrs = IndexMap::new();
        let mut diags = Diagnostics::new();

        for path in paths {
            let path = path.as_ref();
            let src = match std::fs::read_to_string(path) {
                Ok(src) => src,
                Err(err) => {
                    diags.push(Diagnostic::error(
                        "Failed to read values from file",
                        format!("There was an error reading {}: {}.", path.display(), err),
                    ));
                    continue;
                }
            };
            let (file_attrs, file_diags) = parse_values_source(&src, path);
            diags.append(file_diags);
            attrs.extend(file_attrs);
        }

        (attrs, diags)
    }
}

/// Parses values from in-memory source. The body must consist of attributes
/// only.
pub fn parse_values_source(
    src: &str,
    path: &Path,
) -> (IndexMap<String, hcl::Expression>, Diagnostics) {
    let mut diags = Diagnostics::new();

    let body = match hcl::parse(src) {
        Ok(body) => body,
        Err(err) => {
            diags.push(Diagnostic::error(
                "Failed to parse values file",
                format!("There was an error parsing {}: {}.", path.display(), err),
            ));
            return (IndexMap::new(), diags);
        }
    };

    for block in body.blocks() {
        diags.push(
            Diagnostic::error(
                "Unsupported block in values file",
                "A values file may contain only top-level attributes.",
            )
            .with_subject(Subject::in_file(path, block.identifier())),
        );
    }

    let attrs = body
        .attributes()
        .map(|attr| (attr.key().to_string(), attr.expr().clone()))
        .collect();
    (attrs, diags)
}
