use crate::error::InputError;
use crate::models::{AnalysisRequest, EmbeddedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use std::path::Path;
use tracing::{debug, info};

/// Form fields accumulated before submit. Nothing leaves the draft until
/// `submit` succeeds.
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    pub url: String,
    pub business_name: String,
    pub target_audience: String,
    pub description: String,
    pub current_content: String,
    pub image: Option<EmbeddedImage>,
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn business_name(mut self, name: impl Into<String>) -> Self {
        self.business_name = name.into();
        self
    }

    pub fn target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = audience.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn current_content(mut self, content: impl Into<String>) -> Self {
        self.current_content = content.into();
        self
    }

    /// Reads an image from disk and embeds it. The read is awaited to
    /// completion before the draft changes.
    pub async fn attach_image(&mut self, path: &Path) -> Result<(), InputError> {
        self.image = Some(load_image(path).await?);
        Ok(())
    }

    pub fn attach_data_uri(&mut self, uri: &str) -> Result<(), InputError> {
        let image = EmbeddedImage::from_data_uri(uri).ok_or(InputError::InvalidDataUri)?;
        if !image.mime_type.starts_with("image/") {
            return Err(InputError::InvalidDataUri);
        }
        self.image = Some(image);
        Ok(())
    }

    pub fn submit(&self) -> Result<AnalysisRequest, InputError> {
        let required = [
            ("Business name", &self.business_name),
            ("Target audience", &self.target_audience),
            ("Description", &self.description),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(InputError::MissingField(label));
            }
        }

        Ok(AnalysisRequest {
            url: non_blank(&self.url),
            business_name: self.business_name.trim().to_string(),
            target_audience: self.target_audience.trim().to_string(),
            description: self.description.trim().to_string(),
            current_content: non_blank(&self.current_content),
            image: self.image.clone(),
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Encodes an image file as an `EmbeddedImage`. Only `image/*` types pass,
/// mirroring the file picker's filter.
pub async fn load_image(path: &Path) -> Result<EmbeddedImage, InputError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_().as_str() != "image" {
        return Err(InputError::NotAnImage {
            path: path.display().to_string(),
            mime: mime.to_string(),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| InputError::ImageRead {
            path: path.display().to_string(),
            source,
        })?;
    debug!("Loaded image {} ({} bytes, {})", path.display(), bytes.len(), mime);

    Ok(EmbeddedImage {
        mime_type: mime.essence_str().to_string(),
        data: STANDARD.encode(bytes),
    })
}

/// Validator for the starred prompts. dialoguer only rejects `""` by itself.
fn required_answer(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("This field is required")
    } else {
        Ok(())
    }
}

fn prompt_draft(theme: &ColorfulTheme) -> anyhow::Result<RequestDraft> {
    let url: String = Input::with_theme(theme)
        .with_prompt("Website URL (optional)")
        .allow_empty(true)
        .interact_text()?;
    let business_name: String = Input::with_theme(theme)
        .with_prompt("Business name *")
        .validate_with(required_answer)
        .interact_text()?;
    let target_audience: String = Input::with_theme(theme)
        .with_prompt("Target audience *")
        .validate_with(required_answer)
        .interact_text()?;
    let description: String = Input::with_theme(theme)
        .with_prompt("Description / goals *")
        .validate_with(required_answer)
        .interact_text()?;
    let current_content: String = Input::with_theme(theme)
        .with_prompt("Sample content (optional)")
        .allow_empty(true)
        .interact_text()?;

    Ok(RequestDraft::new()
        .url(url)
        .business_name(business_name)
        .target_audience(target_audience)
        .description(description)
        .current_content(current_content))
}

/// Prompts for every form field and returns the submitted request.
/// Re-prompts until the required fields are filled.
pub async fn collect_interactive() -> anyhow::Result<AnalysisRequest> {
    let theme = ColorfulTheme::default();

    println!("\n📝 Website context");
    println!("==================");

    let mut draft = loop {
        let draft = prompt_draft(&theme)?;
        match draft.submit() {
            Ok(_) => break draft,
            Err(e) => println!("⚠️  {}", e),
        }
    };

    let attach = Confirm::with_theme(&theme)
        .with_prompt("Attach a screenshot?")
        .default(false)
        .interact()?;
    if attach {
        loop {
            let source: String = Input::with_theme(&theme)
                .with_prompt("Screenshot path or data URI (empty to skip)")
                .allow_empty(true)
                .interact_text()?;
            let source = source.trim();
            if source.is_empty() {
                break;
            }
            let attached = if source.starts_with("data:") {
                draft.attach_data_uri(source)
            } else {
                draft.attach_image(Path::new(source)).await
            };
            match attached {
                Ok(()) => {
                    info!("Screenshot attached");
                    break;
                }
                Err(e) => println!("⚠️  {}", e),
            }
        }
    }

    Ok(draft.submit()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn eco_store() -> RequestDraft {
        RequestDraft::new()
            .business_name("EcoStore")
            .target_audience("eco-conscious millennials")
            .description("sells reusable bottles")
            .current_content("")
    }

    #[test]
    fn submit_trims_and_drops_blank_optionals() {
        let request = eco_store().url("  ").submit().unwrap();
        assert_eq!(request.business_name, "EcoStore");
        assert!(request.url.is_none());
        assert!(request.current_content.is_none());
        assert!(request.image.is_none());
    }

    #[test]
    fn submit_names_the_first_missing_field() {
        let err = RequestDraft::new()
            .target_audience("anyone")
            .submit()
            .unwrap_err();
        assert!(matches!(err, InputError::MissingField("Business name")));

        let err = eco_store().description("   ").submit().unwrap_err();
        assert_eq!(err.to_string(), "Description is required");
    }

    #[tokio::test]
    async fn attach_image_embeds_mime_and_base64() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        let mut draft = eco_store();
        draft.attach_image(file.path()).await.unwrap();
        let image = draft.submit().unwrap().image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, STANDARD.encode([0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn attach_image_rejects_non_images() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let mut draft = eco_store();
        let err = draft.attach_image(file.path()).await.unwrap_err();
        assert!(matches!(err, InputError::NotAnImage { .. }));
        assert!(draft.image.is_none());
    }

    #[tokio::test]
    async fn attach_image_reports_missing_file() {
        let mut draft = eco_store();
        let err = draft
            .attach_image(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::ImageRead { .. }));
    }

    #[test]
    fn required_prompts_reject_whitespace_answers() {
        assert!(required_answer(&"   ".to_string()).is_err());
        assert!(required_answer(&"\t\n".to_string()).is_err());
        assert!(required_answer(&" EcoStore ".to_string()).is_ok());
    }

    #[test]
    fn whitespace_business_name_fails_submit_without_consuming_the_draft() {
        let draft = eco_store().business_name("   ");
        let err = draft.submit().unwrap_err();
        assert_eq!(err.to_string(), "Business name is required");

        // a corrected answer on the same draft goes through
        let request = draft.business_name("EcoStore").submit().unwrap();
        assert_eq!(request.business_name, "EcoStore");
    }

    #[test]
    fn data_uri_attachment_must_be_an_image() {
        let mut draft = eco_store();
        draft.attach_data_uri("data:image/jpeg;base64,/9j/4AAQ").unwrap();
        assert_eq!(draft.submit().unwrap().image.unwrap().mime_type, "image/jpeg");

        let mut draft = eco_store();
        assert!(draft.attach_data_uri("data:text/plain;base64,aGk=").is_err());
        assert!(draft.image.is_none());
    }
}
