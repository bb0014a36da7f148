//! Running all cleaning stages in order.

use crate::context::Context;
use crate::error::{Diagnostic, Diagnostics, Error, Result};
use crate::options::{AppearanceMode, CleanOptions, SanitizeMode};
use crate::{appearance, encrypt, gc, pages, sanitize, streams};
use log::{debug, info};
use rinse_write::ObjectStreamPlan;
use std::io::Write;
use std::path::Path;

/// A cleaned document.
#[derive(Debug, Clone)]
pub struct Cleaned {
    /// The serialized output file.
    pub data: Vec<u8>,
    /// The problems that were worked around.
    pub diagnostics: Diagnostics,
}

/// Clean a PDF file held in memory.
///
/// Fails without producing any output if the options are inconsistent, the input can't be
/// parsed, the password is wrong or a requested page doesn't exist. All other problems are
/// worked around and reported in [`Cleaned::diagnostics`].
pub fn clean(data: &[u8], options: &CleanOptions) -> Result<Cleaned> {
    let settings = options.validate()?;
    let doc = rinse_syntax::load(data, &settings.input_password)?;

    debug!(
        "loaded a PDF {} document with {} objects",
        doc.version,
        doc.objects.len()
    );

    let mut ctx = Context::new(doc, settings);

    if ctx.doc.repaired {
        ctx.diagnostics.push(Diagnostic::Repaired);
    }

    if ctx.settings.linearize {
        ctx.diagnostics.push(Diagnostic::LinearizationUnsupported);
    }

    pages::select_pages(&mut ctx)?;
    let first = gc::collect(&mut ctx, true);
    streams::recode(&mut ctx);
    sanitize::sanitize(&mut ctx);
    appearance::generate(&mut ctx);

    let mut removed = first.removed;

    // Both stages can leave behind objects that are no longer referenced.
    if ctx.settings.sanitize != SanitizeMode::Off
        || ctx.settings.appearance != AppearanceMode::None
    {
        removed += gc::collect(&mut ctx, false).removed;
    }

    let plan = ctx
        .settings
        .object_streams
        .then(|| ObjectStreamPlan::new(&ctx.doc));
    let handler = encrypt::encrypt(&mut ctx, plan.as_ref());

    let data = rinse_write::write(
        &ctx.doc,
        &ctx.settings.write_settings(),
        plan.as_ref(),
        handler.as_ref(),
    );

    info!(
        "wrote {} bytes with {} objects ({} removed, {} merged, {} diagnostics)",
        data.len(),
        ctx.doc.objects.len() + plan.as_ref().map_or(0, |p| p.groups().len()),
        removed,
        first.merged,
        ctx.diagnostics.len()
    );

    Ok(Cleaned {
        data,
        diagnostics: ctx.diagnostics,
    })
}

/// Clean the PDF file at `input` and write the result to `output`.
///
/// The output is first written to a temporary file next to `output`, which then replaces
/// `output`. If cleaning fails, `output` is not touched. `input` and `output` may be the same
/// path.
pub fn clean_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &CleanOptions,
) -> Result<Diagnostics> {
    let output = output.as_ref();
    let data = std::fs::read(input)?;
    let cleaned = clean(&data, options)?;

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&cleaned.data)?;
    file.as_file().sync_all()?;
    file.persist(output).map_err(|err| Error::Io(err.error))?;

    Ok(cleaned.diagnostics)
}

#[cfg(test)]
mod tests {
    use super::{clean, clean_file};
    use crate::error::{Diagnostic, Error};
    use crate::options::CleanOptions;
    use rinse_syntax::load;

    const MINIMAL: &[u8] = b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>
endobj
4 0 obj
(unused)
endobj
trailer
<< /Root 1 0 R /Size 5 >>
startxref
0
%%EOF
";

    #[test]
    fn broken_xref_is_reported() {
        let cleaned = clean(MINIMAL, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.diagnostics.as_slice(), [Diagnostic::Repaired]);

        let doc = load(&cleaned.data, b"").unwrap();
        assert!(!doc.repaired);
        assert_eq!(doc.objects.len(), 4);
    }

    #[test]
    fn linearization_is_a_diagnostic() {
        let options = CleanOptions {
            linearize: true,
            garbage: 2,
            ..CleanOptions::default()
        };
        let cleaned = clean(MINIMAL, &options).unwrap();

        assert!(
            cleaned
                .diagnostics
                .iter()
                .any(|d| *d == Diagnostic::LinearizationUnsupported)
        );
        assert_eq!(load(&cleaned.data, b"").unwrap().objects.len(), 3);
    }

    #[test]
    fn invalid_options_fail_first() {
        let options = CleanOptions {
            user_password: "secret".to_string(),
            ..CleanOptions::default()
        };

        assert!(matches!(
            clean(b"not a pdf", &options),
            Err(Error::EncryptionConfig(_))
        ));
    }

    #[test]
    fn failed_runs_leave_the_output_alone() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");

        std::fs::write(&input, b"garbage").unwrap();
        std::fs::write(&output, b"previous").unwrap();

        assert!(clean_file(&input, &output, &CleanOptions::default()).is_err());
        assert_eq!(std::fs::read(&output).unwrap(), b"previous");

        std::fs::write(&input, MINIMAL).unwrap();
        clean_file(&input, &input, &CleanOptions::default()).unwrap();
        assert!(load(&std::fs::read(&input).unwrap(), b"").is_ok());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
