use crate::domain::{ContentKind, ContentRequest, GeneratedContent};
use crate::infrastructure::{
    AiGateway, AiGatewayError, ContentRepository, RepositoryError, UserRepository, IMAGE_MODEL,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Content not found: {0}")]
    ContentNotFound(String),
    #[error("Insufficient credits: {required} required")]
    InsufficientCredits { required: i64 },
    #[error("Generation failed: {0}")]
    GenerationFailed(#[from] AiGatewayError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct ContentWorkflow<U, C, G>
where
    U: UserRepository,
    C: ContentRepository,
    G: AiGateway + ?Sized,
{
    user_repo: Arc<U>,
    content_repo: Arc<C>,
    gateway: Arc<G>,
    generation_cost: i64,
}

impl<U, C, G> ContentWorkflow<U, C, G>
where
    U: UserRepository,
    C: ContentRepository,
    G: AiGateway + ?Sized,
{
    pub fn new(
        user_repo: Arc<U>,
        content_repo: Arc<C>,
        gateway: Arc<G>,
        generation_cost: i64,
    ) -> Self {
        Self {
            user_repo,
            content_repo,
            gateway,
            generation_cost,
        }
    }

    /// Generate text for `prompt` and store it as version 1 of a new request.
    ///
    /// Credits are reserved before the provider is called and given back if
    /// anything after the reservation fails, so a failed generation costs nothing.
    pub async fn generate(
        &self,
        user_id: &str,
        model: &str,
        prompt: &str,
    ) -> Result<GeneratedContent, ContentError> {
        let request = ContentRequest::new(
            user_id.to_string(),
            model.to_string(),
            ContentKind::Text,
            prompt.to_string(),
        );

        self.run(request).await
    }

    /// Generate an illustration for `prompt`. The stored output is the image URL.
    pub async fn generate_image(
        &self,
        user_id: &str,
        prompt: &str,
    ) -> Result<GeneratedContent, ContentError> {
        let request = ContentRequest::new(
            user_id.to_string(),
            IMAGE_MODEL.to_string(),
            ContentKind::Image,
            prompt.to_string(),
        );

        self.run(request).await
    }

    async fn run(&self, request: ContentRequest) -> Result<GeneratedContent, ContentError> {
        let cost = self.generation_cost;
        let user_id = request.user_id.clone();

        let user = self.user_repo.get_by_id(&user_id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => ContentError::UserNotFound(user_id.clone()),
            other => ContentError::Repository(other),
        })?;

        if !user.can_afford(cost) {
            return Err(ContentError::InsufficientCredits { required: cost });
        }

        let remaining = self
            .user_repo
            .reserve_credits(&user_id, cost)
            .await?
            .ok_or(ContentError::InsufficientCredits { required: cost })?;

        if let Err(e) = self.content_repo.create_request(&request).await {
            self.refund(&user_id, cost).await;
            return Err(e.into());
        }
        info!(
            request_id = %request.id,
            user_id = %user_id,
            kind = %request.kind,
            model = %request.model,
            remaining,
            "Created content request"
        );

        let output = match request.kind {
            ContentKind::Text => {
                self.gateway
                    .generate_text(&request.model, &request.prompt)
                    .await
            }
            ContentKind::Image => self.gateway.generate_image(&request.id, &request.prompt).await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Generation failed");
                self.abandon(&request, cost).await;
                return Err(ContentError::GenerationFailed(e));
            }
        };

        let content = GeneratedContent::first_version(&request, output);
        if let Err(e) = self.content_repo.complete_request(&request.id, &content).await {
            error!(request_id = %request.id, error = %e, "Failed to store generated content");
            self.abandon(&request, cost).await;
            return Err(e.into());
        }

        info!(request_id = %request.id, content_id = %content.id, "Completed content request");
        Ok(content)
    }

    async fn abandon(&self, request: &ContentRequest, cost: i64) {
        if let Err(e) = self.content_repo.fail_request(&request.id).await {
            error!(request_id = %request.id, error = %e, "Failed to mark request as failed");
        }
        self.refund(&request.user_id, cost).await;
    }

    async fn refund(&self, user_id: &str, cost: i64) {
        if let Err(e) = self.user_repo.refund_credits(user_id, cost).await {
            error!(user_id, cost, error = %e, "Failed to refund credits");
        }
    }

    pub async fn get_user_content(
        &self,
        user_id: &str,
    ) -> Result<Vec<GeneratedContent>, ContentError> {
        Ok(self.content_repo.list_content_for_user(user_id).await?)
    }

    /// Content owned by someone else is reported as not found.
    pub async fn get_content_by_id(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<GeneratedContent, ContentError> {
        self.content_repo
            .get_content_for_user(user_id, content_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => {
                    ContentError::ContentNotFound(content_id.to_string())
                }
                other => ContentError::Repository(other),
            })
    }

    pub async fn list_user_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<ContentRequest>, ContentError> {
        Ok(self.content_repo.list_requests_for_user(user_id).await?)
    }
}
