//! PDF contract extraction through the generative-AI model.
//!
//! Workflow:
//! 1. Stage the uploaded PDF under the upload folder
//! 2. Upload the contract and the extraction rules PDF
//! 3. Ask the model for one contract level as strict JSON
//! 4. Delete the uploaded files, remove the staged PDF
//! 5. Parse the reply and save it under the extractions folder
use crate::config::Config;
use crate::contract_store::ContractStore;
use crate::errors::{AppError, ResultExt};
use crate::gemini_client::{GeminiClient, Part, UploadedFile};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use unicode_normalization::UnicodeNormalization;

const PDF_MIME: &str = "application/pdf";

static STAGED_UPLOADS: AtomicU64 = AtomicU64::new(0);

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("valid fence pattern"));

/// Returns the content of the first fenced ```json block, or the whole text.
pub fn extract_json_block(text: &str) -> &str {
    JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// Parses the model's reply into JSON.
pub fn parse_model_json(text: &str) -> Result<Value, AppError> {
    serde_json::from_str(extract_json_block(text)).map_err(|e| AppError::InvalidModelOutput {
        message: e.to_string(),
        raw: text.to_string(),
    })
}

/// Unique local name for a staged upload; the client's name is kept as suffix.
fn staging_name(safe_name: &str) -> String {
    format!(
        "{}_{}_{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S%6f"),
        STAGED_UPLOADS.fetch_add(1, Ordering::Relaxed),
        safe_name
    )
}

/// Reduces an uploaded file name to a safe single path component.
///
/// Accented letters are folded to ASCII (NFKD, marks dropped). Keeps ASCII
/// alphanumerics, `.`, `-` and `_`; whitespace becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .nfkd()
        .filter(|c| c.is_ascii())
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

pub fn build_extraction_prompt(level_name: &str, example_json: &str) -> String {
    format!(
        r#"
Tu es une IA experte en extraction de données contractuelles à partir de documents PDF.

**Ta mission est double :**
1.  **Analyser le PDF de règles (`regles.pdf`)** pour comprendre les instructions d'extraction.
2.  **Extraire les données du PDF du contrat** en suivant scrupuleusement ces règles.

L'extraction concerne le niveau **"{level_name}"**.

Le format de sortie doit être un **JSON strict**, comme cet exemple :
```json
{example_json}
```

🔍 **Instruction cruciale :** Le PDF `regles.pdf` fourni contient les directives impératives pour l'extraction. Tu dois t'y conformer.

➡️ Retourne exclusivement le JSON, sans explication ou texte additionnel.
"#
    )
}

pub struct ExtractionService {
    client: GeminiClient,
    store: Arc<ContractStore>,
    examples_path: PathBuf,
    rules_pdf_path: PathBuf,
    upload_dir: PathBuf,
    extractions_dir: PathBuf,
    append_to_store: bool,
}

impl ExtractionService {
    pub fn new(config: &Config, client: GeminiClient, store: Arc<ContractStore>) -> Self {
        Self {
            client,
            store,
            examples_path: config.examples_path.clone(),
            rules_pdf_path: config.rules_pdf_path.clone(),
            upload_dir: config.upload_dir.clone(),
            extractions_dir: config.extractions_dir.clone(),
            append_to_store: config.append_extractions,
        }
    }

    /// Extracts one contract level from a PDF.
    ///
    /// # Arguments
    ///
    /// * `pdf` - Uploaded PDF content.
    /// * `filename` - Client-side file name, sanitized before use.
    /// * `level_name` - Level to extract (e.g. "Niveau 1").
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The extracted contract record.
    pub async fn extract(
        &self,
        pdf: Vec<u8>,
        filename: &str,
        level_name: &str,
    ) -> Result<Value, AppError> {
        let safe_name = match sanitize_filename(filename) {
            name if name.is_empty() => "contract.pdf".to_string(),
            name => name,
        };

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .context("Creating upload folder")?;
        let staged = self.upload_dir.join(staging_name(&safe_name));
        tokio::fs::write(&staged, &pdf)
            .await
            .with_context(|| format!("Saving upload to {}", staged.display()))?;
        tracing::info!("Saved upload to {}", staged.display());

        let result = self.extract_staged(&staged, &safe_name, level_name).await;

        if let Err(e) = tokio::fs::remove_file(&staged).await {
            tracing::warn!("Failed to remove staged upload {}: {}", staged.display(), e);
        } else {
            tracing::debug!("Cleaned up local upload: {}", staged.display());
        }

        result
    }

    async fn extract_staged(
        &self,
        staged: &Path,
        safe_name: &str,
        level_name: &str,
    ) -> Result<Value, AppError> {
        let example_json = self.load_example().await?;
        if !tokio::fs::try_exists(&self.rules_pdf_path).await.unwrap_or(false) {
            return Err(AppError::ConfigError(format!(
                "Rules file {} not found",
                self.rules_pdf_path.display()
            )));
        }

        let prompt = build_extraction_prompt(level_name, &example_json);
        let text = self.generate_with_files(staged, safe_name, prompt).await?;
        tracing::debug!("Model output: {}", text);

        let parsed = parse_model_json(&text)?;

        let stem = Path::new(safe_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract".to_string());
        let saved = self.save_extraction(&parsed, &stem).await?;
        tracing::info!("Successfully stored extraction in {}", saved.display());

        if self.append_to_store {
            self.store
                .append(parsed.clone())
                .await
                .context("Appending extraction to contract collection")?;
        }

        Ok(parsed)
    }

    /// Uploads contract and rules, runs the prompt, then deletes the uploads
    /// whatever the outcome.
    async fn generate_with_files(
        &self,
        staged: &Path,
        safe_name: &str,
        prompt: String,
    ) -> Result<String, AppError> {
        let mut uploaded: Vec<UploadedFile> = Vec::new();

        let result: Result<String, AppError> = async {
            let contract_bytes = tokio::fs::read(staged).await?;
            let contract = self
                .client
                .upload_file(contract_bytes, safe_name, PDF_MIME)
                .await
                .context("Uploading contract PDF")?;
            uploaded.push(contract.clone());

            let rules_bytes = tokio::fs::read(&self.rules_pdf_path).await?;
            let rules = self
                .client
                .upload_file(rules_bytes, "regles.pdf", PDF_MIME)
                .await
                .context("Uploading rules PDF")?;
            uploaded.push(rules.clone());

            self.client
                .generate_content(&[Part::text(prompt), Part::file(&rules), Part::file(&contract)])
                .await
        }
        .await;

        for file in &uploaded {
            if let Err(e) = self.client.delete_file(&file.name).await {
                tracing::warn!("Failed to delete uploaded file {}: {}", file.name, e);
            }
        }

        result
    }

    async fn load_example(&self) -> Result<String, AppError> {
        let content = tokio::fs::read_to_string(&self.examples_path)
            .await
            .map_err(|e| {
                AppError::ConfigError(format!(
                    "Cannot read {}: {}",
                    self.examples_path.display(),
                    e
                ))
            })?;

        let examples: Value = serde_json::from_str(&content).map_err(|e| {
            AppError::ConfigError(format!("{} is not valid JSON: {}", self.examples_path.display(), e))
        })?;

        match examples.as_array().and_then(|list| list.first()) {
            Some(first) => Ok(serde_json::to_string_pretty(first)?),
            None => Err(AppError::ConfigError(format!(
                "{} is empty or malformed",
                self.examples_path.display()
            ))),
        }
    }

    async fn save_extraction(&self, parsed: &Value, stem: &str) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(&self.extractions_dir)
            .await
            .context("Creating extractions folder")?;

        let timestamp = chrono::Utc::now().timestamp();
        let content = serde_json::to_string_pretty(parsed)?;

        // same stem within the same second gets a numeric suffix
        for attempt in 0u32..1000 {
            let name = match attempt {
                0 => format!("{}_{}.json", timestamp, stem),
                n => format!("{}_{}_{}.json", timestamp, stem, n),
            };
            let path = self.extractions_dir.join(name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Creating {}", path.display()));
                }
            };
            file.write_all(content.as_bytes())
                .await
                .with_context(|| format!("Writing {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("Writing {}", path.display()))?;
            return Ok(path);
        }

        Err(AppError::StorageError(format!(
            "No free extraction file name for {}",
            stem
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_json() {
        let text = "Voici le résultat :\n```json\n{\"level_id\": \"n1\"}\n```\nFin.";
        assert_eq!(extract_json_block(text), "{\"level_id\": \"n1\"}");
    }

    #[test]
    fn test_unfenced_text_is_returned_whole() {
        let text = "{\"level_id\": \"n1\"}";
        assert_eq!(extract_json_block(text), text);
    }

    #[test]
    fn test_parse_model_json_failure_keeps_raw() {
        match parse_model_json("Désolé, je ne peux pas.") {
            Err(AppError::InvalidModelOutput { raw, .. }) => {
                assert_eq!(raw, "Désolé, je ne peux pas.")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\Contrat Santé 2024.pdf"), "Contrat_Sante_2024.pdf");
        assert_eq!(sanitize_filename("Garanties Élève Œuvre.pdf"), "Garanties_Eleve_uvre.pdf");
        assert_eq!(sanitize_filename("contrat.pdf"), "contrat.pdf");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn test_staging_names_are_unique() {
        let first = staging_name("contrat.pdf");
        let second = staging_name("contrat.pdf");
        assert_ne!(first, second);
        assert!(first.ends_with("_contrat.pdf"));
    }

    #[test]
    fn test_prompt_mentions_level_and_example() {
        let prompt = build_extraction_prompt("Niveau 3", "{\"insurer\": \"X\"}");
        assert!(prompt.contains("\"Niveau 3\""));
        assert!(prompt.contains("{\"insurer\": \"X\"}"));
    }
}
