//! Local Docker provider built on the bollard crate.
//!
//! Runs any Docker image as a sandbox. The credential passed to
//! `authenticate` is the image name; each sandbox is one container kept alive
//! with `sleep` for the requested lifetime. Files move in and out as tar
//! archives through the Docker archive API.

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, InspectContainerOptions,
    LogOutput, RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ProviderError;

use super::{ApiCallCounter, ExecOutput, ProviderInfo, SandboxProvider, SandboxStatus};

/// Connected Docker daemon plus the image chosen at authentication.
struct DockerSession {
    docker: Docker,
    image: String,
}

/// Sandbox provider backed by the local Docker daemon.
pub struct DockerImageProvider {
    info: ProviderInfo,
    session: OnceLock<DockerSession>,
    calls: ApiCallCounter,
}

impl DockerImageProvider {
    /// Registry name of this provider.
    pub const NAME: &'static str = "docker-image";

    /// Creates an unauthenticated provider session.
    pub fn new() -> Self {
        Self {
            info: ProviderInfo::new(
                "Docker Image",
                "Run any Docker image as a sandbox",
                "https://docs.docker.com",
            ),
            session: OnceLock::new(),
            calls: ApiCallCounter::new(),
        }
    }

    fn session(&self) -> Result<&DockerSession, ProviderError> {
        self.session.get().ok_or(ProviderError::NotAuthenticated)
    }

    /// Pulls the image unless it is already present locally.
    async fn ensure_image(&self, docker: &Docker, image: &str) -> Result<(), ProviderError> {
        self.calls.record();
        if docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!(image = image, "Pulling sandbox image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        self.calls.record();
        let mut stream = docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                ProviderError::SandboxCreation(format!("Failed to pull image {image}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Runs one exec inside the container and collects its output.
    async fn run_exec(&self, container: &str, cmd: Vec<String>) -> Result<ExecOutput, ProviderError> {
        let docker = &self.session()?.docker;

        let exec_options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        self.calls.record();
        let exec = docker
            .create_exec(container, exec_options)
            .await
            .map_err(|e| ProviderError::Execution(format!("Failed to create exec: {e}")))?;

        self.calls.record();
        let start_result = docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| ProviderError::Execution(format!("Failed to start exec: {e}")))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(ProviderError::Execution(format!(
                            "Error reading output: {e}"
                        )));
                    }
                }
            }
        }

        self.calls.record();
        let exec_info = docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| ProviderError::Execution(format!("Failed to inspect exec: {e}")))?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: exec_info.exit_code.unwrap_or(-1),
        })
    }
}

impl Default for DockerImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxProvider for DockerImageProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn authenticate(&self, credential: &str) -> Result<(), ProviderError> {
        let image = credential.trim();
        if image.is_empty() {
            return Err(ProviderError::Authentication(
                "no Docker image given (set DOCKER_IMAGE)".to_string(),
            ));
        }

        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            ProviderError::Authentication(format!("Docker daemon not available: {e}"))
        })?;

        self.calls.record();
        docker.ping().await.map_err(|e| {
            ProviderError::Authentication(format!("Docker daemon not responding: {e}"))
        })?;

        // A session is authenticated once; later calls keep the first image.
        let _ = self.session.set(DockerSession {
            docker,
            image: image.to_string(),
        });
        Ok(())
    }

    async fn create_sandbox(
        &self,
        image: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let session = self.session()?;
        let image = image.unwrap_or(&session.image).to_string();
        self.ensure_image(&session.docker, &image).await?;

        let name = format!("sandbox-bench-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let lifetime = timeout.as_secs().max(1).to_string();

        let container_config = Config {
            image: Some(image.clone()),
            cmd: Some(vec!["sleep".to_string(), lifetime]),
            labels: Some(HashMap::from([(
                "sandbox-bench".to_string(),
                "true".to_string(),
            )])),
            tty: Some(false),
            host_config: Some(HostConfig {
                network_mode: Some("bridge".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        self.calls.record();
        let response = session
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| ProviderError::SandboxCreation(format!("Failed to create container: {e}")))?;

        self.calls.record();
        if let Err(e) = session
            .docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
        {
            // The container exists but never started; remove it before failing.
            let _ = self.destroy(&response.id).await;
            return Err(ProviderError::SandboxCreation(format!(
                "Failed to start container: {e}"
            )));
        }

        debug!(container = %name, id = %response.id, image = %image, "Docker sandbox started");
        Ok(response.id)
    }

    async fn execute(
        &self,
        sandbox_id: &str,
        code: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ProviderError> {
        let cmd = command_for(language, code)?;
        match tokio::time::timeout(timeout, self.run_exec(sandbox_id, cmd)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout("execute", timeout)),
        }
    }

    async fn write_file(
        &self,
        sandbox_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ProviderError> {
        let docker = &self.session()?.docker;
        let archive = pack_file(path, content).map_err(|e| ProviderError::file(path, e))?;

        let options = UploadToContainerOptions {
            path: "/",
            ..Default::default()
        };

        self.calls.record();
        docker
            .upload_to_container(sandbox_id, Some(options), archive.into())
            .await
            .map_err(|e| ProviderError::file(path, e))
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
        let docker = &self.session()?.docker;
        let options = DownloadFromContainerOptions { path };

        self.calls.record();
        let mut stream = docker.download_from_container(sandbox_id, Some(options));
        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProviderError::file(path, e))?;
            archive.extend_from_slice(&chunk);
        }

        unpack_first_file(&archive).map_err(|e| ProviderError::file(path, e))
    }

    async fn destroy(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        let docker = &self.session()?.docker;
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.calls.record();
        match docker.remove_container(sandbox_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(id = sandbox_id, "Container already removed");
                Ok(())
            }
            Err(e) => Err(ProviderError::Execution(format!(
                "Failed to remove container: {e}"
            ))),
        }
    }

    async fn status(&self, sandbox_id: &str) -> SandboxStatus {
        let Ok(session) = self.session() else {
            return SandboxStatus::Unknown;
        };

        self.calls.record();
        let info = match session
            .docker
            .inspect_container(sandbox_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return SandboxStatus::Stopped,
            Err(e) => return SandboxStatus::Error(e.to_string()),
        };

        let status = info
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();

        match status.as_str() {
            "running" => SandboxStatus::Running,
            "created" | "exited" | "removing" => SandboxStatus::Stopped,
            "dead" => SandboxStatus::Error("container is dead".to_string()),
            _ => SandboxStatus::Unknown,
        }
    }

    fn api_call_count(&self) -> u64 {
        self.calls.get()
    }

    fn reset_api_call_count(&self) {
        self.calls.reset();
    }
}

/// Builds the argv that runs `code` in `language` inside the container.
fn command_for(language: &str, code: &str) -> Result<Vec<String>, ProviderError> {
    let interpreter: [&str; 2] = match language {
        "python" | "python3" => ["python3", "-c"],
        "sh" | "shell" | "bash" => ["sh", "-c"],
        "node" | "javascript" | "js" => ["node", "-e"],
        other => {
            return Err(ProviderError::Execution(format!(
                "Unsupported language: {other}"
            )))
        }
    };

    Ok(interpreter
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(code.to_string()))
        .collect())
}

/// Packs one file into a tar archive rooted at `/`.
fn pack_file(path: &str, content: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, path.trim_start_matches('/'), content)?;
    builder.into_inner()
}

/// Returns the contents of the first regular file in a tar archive.
fn unpack_first_file(archive: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut archive = tar::Archive::new(archive);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type().is_file() {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "archive contains no regular file",
    ))
}
