use super::delimiters::{self, TEXT_HELPER, VAULT_HELPER};
use super::helpers;
use crate::error::{VaultifyError, VaultifyResult};
use crate::secrets::{Secret, SecretReader, SecretsRecord};
use crate::traits::Output;
use handlebars::{
    Handlebars, Helper, HelperDef, HelperResult, RenderContext, RenderError, RenderErrorReason,
    ScopedJson, TemplateError,
};
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

const TEMPLATE_NAME: &str = "template";

/// Renders `<{ }>` templates, capturing every secret they look up.
///
/// The renderer holds no per-render state and can be reused.
pub struct TemplateRenderer {
    reader: Arc<dyn SecretReader>,
    output: Arc<dyn Output>,
}

impl TemplateRenderer {
    /// Create a renderer that resolves `vault` lookups through `reader`
    pub fn new(reader: Arc<dyn SecretReader>, output: Arc<dyn Output>) -> Self {
        Self { reader, output }
    }

    /// Render `source` into `sink` and return the secrets it consulted.
    ///
    /// The record always carries the reader's auth secret, plus one entry per
    /// distinct name passed to `vault`. On any failure nothing is written to
    /// `sink`.
    pub fn render(&self, source: &str, sink: &mut dyn Write) -> VaultifyResult<SecretsRecord> {
        let translated = delimiters::translate(source)?;
        let collector = RecordCollector::new(self.reader.auth_secret());

        self.output.debug(&format!(
            "Rendering template ({} bytes) with {} secret reader",
            source.len(),
            self.reader.get_type()
        ));

        let rendered = {
            let mut handlebars = Handlebars::new();
            handlebars.set_strict_mode(true);
            handlebars.register_escape_fn(handlebars::no_escape);
            helpers::register(&mut handlebars);
            handlebars.register_helper(
                TEXT_HELPER,
                Box::new(TextHelper {
                    chunks: &translated.chunks,
                }),
            );
            handlebars.register_helper(
                VAULT_HELPER,
                Box::new(VaultHelper {
                    reader: self.reader.as_ref(),
                    collector: &collector,
                    output: self.output.as_ref(),
                }),
            );

            handlebars
                .register_template_string(TEMPLATE_NAME, &translated.source)
                .map_err(parse_error)?;

            match handlebars.render(TEMPLATE_NAME, &Value::Object(Default::default())) {
                Ok(rendered) => rendered,
                Err(err) => {
                    return Err(collector
                        .take_failure()
                        .unwrap_or_else(|| VaultifyError::Render(err.to_string())));
                }
            }
        };

        sink.write_all(rendered.as_bytes())
            .and_then(|()| sink.flush())
            .map_err(|e| VaultifyError::io("<output>", e))?;

        let record = collector.into_record();
        self.output.info(&format!(
            "Rendered {} bytes using {} secret(s)",
            rendered.len(),
            record.len()
        ));
        Ok(record)
    }
}

fn parse_error(err: TemplateError) -> VaultifyError {
    VaultifyError::Parse {
        line: err.pos().map_or(1, |(line, _)| line),
        message: err.reason().to_string(),
    }
}

/// Per-render accumulator of looked-up secrets.
///
/// Also keeps the first lookup failure so the caller sees the underlying error
/// kind rather than the Handlebars wrapper.
struct RecordCollector {
    record: Mutex<SecretsRecord>,
    failure: Mutex<Option<VaultifyError>>,
}

impl RecordCollector {
    fn new(auth_secret: Secret) -> Self {
        Self {
            record: Mutex::new(SecretsRecord::new(auth_secret)),
            failure: Mutex::new(None),
        }
    }

    fn capture(&self, name: &str, secret: Secret) {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, secret);
    }

    fn fail(&self, err: VaultifyError) -> RenderError {
        let message = err.to_string();
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(err);
        }
        RenderErrorReason::Other(message).into()
    }

    fn take_failure(&self) -> Option<VaultifyError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn into_record(self) -> SecretsRecord {
        self.record
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writes back a literal text chunk of the source template.
struct TextHelper<'a> {
    chunks: &'a [String],
}

impl HelperDef for TextHelper<'_> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc handlebars::Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn handlebars::Output,
    ) -> HelperResult {
        let chunk = h
            .param(0)
            .and_then(|v| v.value().as_u64())
            .and_then(|index| self.chunks.get(usize::try_from(index).ok()?))
            .ok_or_else(|| RenderErrorReason::Other("unknown text chunk".to_string()))?;
        out.write(chunk)?;
        Ok(())
    }
}

/// The `vault NAME` lookup function.
struct VaultHelper<'a> {
    reader: &'a dyn SecretReader,
    collector: &'a RecordCollector,
    output: &'a dyn Output,
}

impl VaultHelper<'_> {
    fn secret_name<'h>(&self, h: &'h Helper) -> VaultifyResult<&'h str> {
        if !h.hash().is_empty() {
            return Err(VaultifyError::InvalidArgument(
                "vault takes no named arguments".to_string(),
            ));
        }

        let name = match h.params().as_slice() {
            [param] => param.value().as_str().ok_or_else(|| {
                VaultifyError::InvalidArgument(format!(
                    "vault expects a string secret name, got {}",
                    param.value()
                ))
            })?,
            params => {
                return Err(VaultifyError::InvalidArgument(format!(
                    "vault expects exactly one secret name, got {} arguments",
                    params.len()
                )));
            }
        };

        if name.is_empty() {
            return Err(VaultifyError::InvalidArgument(
                "vault secret name cannot be empty".to_string(),
            ));
        }
        Ok(name)
    }
}

impl HelperDef for VaultHelper<'_> {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc handlebars::Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let name = self
            .secret_name(h)
            .map_err(|err| self.collector.fail(err))?;

        self.output.debug(&format!("Looking up secret '{}'", name));
        match self.reader.get(name) {
            Ok(secret) => {
                let value = secret.value.clone();
                self.collector.capture(name, secret);
                Ok(ScopedJson::Derived(value))
            }
            Err(err) => {
                self.output
                    .debug(&format!("Lookup of '{}' failed: {}", name, err.kind()));
                Err(self.collector.fail(err))
            }
        }
    }
}
