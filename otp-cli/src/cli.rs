//! Main otp-cli command line entry points
use crate::{client::HttpOtpClient, paths::config_file, settings::Settings};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use inquire::{ui::RenderConfig, InquireError};
use otp_core::{
    common::CodeType,
    flow::{FlowController, FlowEvent, FlowPhase},
    notification::{Notification, NotificationKind},
    traits::OtpTransport,
    validation::{FieldErrors, GenerateForm},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "otp-cli")]
#[command(about = "Request one-time passcodes by email and verify them")]
pub struct Cli {
    #[arg(long, help = "Base URL of the OTP provider, overrides the configured one")]
    api_endpoint: Option<Url>,
    #[arg(long, help = "Whether to turn off ansi terminal colors")]
    no_colors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactively request a code, then verify it, as often as you like
    Session,
    /// Request a code to be sent to an email address
    Generate(GenerateCommand),
    /// Verify a code that was sent to an email address
    Verify(VerifyCommand),
    /// Print file paths used by the application (e.g. the path to config)
    Paths,
}

#[derive(Debug, Parser)]
pub struct GenerateCommand {
    /// Email address to send the code to
    #[arg(long)]
    email: String,
    /// Characters the code is made of: numeric, alphanumeric or alphabet
    #[arg(long = "type", default_value = "numeric")]
    code_type: String,
    /// Organization name shown in the email
    #[arg(long)]
    organization: String,
    /// Subject of the email
    #[arg(long)]
    subject: String,
}

#[derive(Debug, Parser)]
pub struct VerifyCommand {
    /// Email address the code was sent to
    #[arg(long)]
    email: String,
    /// The 6 character code from the email
    #[arg(long)]
    code: String,
}

impl Cli {
    pub async fn run(&self, mut settings: Settings) -> Result<()> {
        let ansi = !self.no_colors;
        setup_tracing(ansi);

        if let Some(api_endpoint) = &self.api_endpoint {
            settings.api_endpoint = api_endpoint.clone();
        }

        match &self.command {
            Commands::Session => {
                let client = HttpOtpClient::new(settings.api_endpoint.clone());
                let mut session = Session::new(client, Prompts::new(ansi));
                session.run().await?;
            }
            Commands::Generate(generate) => {
                let form = GenerateForm {
                    email: generate.email.clone(),
                    code_type: generate.code_type.clone(),
                    organization: generate.organization.clone(),
                    subject: generate.subject.clone(),
                };
                let request = form.submit().map_err(reject_input)?;

                let client = HttpOtpClient::new(settings.api_endpoint.clone());
                let mut flow = FlowController::new(client);
                flow.dispatch(FlowEvent::SubmitProfile(request)).await?;

                finish_one_shot(&mut flow)?;
            }
            Commands::Verify(verify) => {
                let client = HttpOtpClient::new(settings.api_endpoint.clone());
                let mut flow = FlowController::resume(client, verify.email.trim());
                let request = flow
                    .verify_form(verify.code.clone())
                    .submit()
                    .map_err(reject_input)?;

                flow.dispatch(FlowEvent::SubmitCode(request)).await?;

                finish_one_shot(&mut flow)?;
            }
            Commands::Paths => {
                println!("{}", config_file()?.display());
            }
        }

        Ok(())
    }
}

/// Answers to the session's questions
trait Prompter {
    /// A free text field, pre-filled with the previous answer if there was one
    fn text(&mut self, message: &str, previous: &str, placeholder: &str) -> Result<String>;
    /// The code type literal, starting at the previous choice
    fn select_code_type(&mut self, previous: &str) -> Result<String>;
    /// The one-time password
    fn code(&mut self) -> Result<String>;
}

/// Terminal prompts
#[derive(Debug)]
struct Prompts {
    render_config: RenderConfig,
}

impl Prompts {
    fn new(colors: bool) -> Self {
        let render_config = if colors {
            RenderConfig::default_colored()
        } else {
            RenderConfig::empty()
        };
        Self { render_config }
    }
}

impl Prompter for Prompts {
    fn text(&mut self, message: &str, previous: &str, placeholder: &str) -> Result<String> {
        let mut prompt = inquire::Text::new(message)
            .with_placeholder(placeholder)
            .with_render_config(self.render_config);
        if !previous.is_empty() {
            prompt = prompt.with_default(previous);
        }
        Ok(prompt.prompt()?)
    }

    fn select_code_type(&mut self, previous: &str) -> Result<String> {
        let cursor = previous
            .parse::<CodeType>()
            .ok()
            .and_then(|previous| CodeType::ALL.iter().position(|t| *t == previous))
            .unwrap_or(0);

        let labels = CodeType::ALL.iter().map(CodeType::label).collect();
        let choice = inquire::Select::new("OTP Type:", labels)
            .with_starting_cursor(cursor)
            .with_render_config(self.render_config)
            .raw_prompt()?;

        let code_type = CodeType::ALL
            .get(choice.index)
            .ok_or_else(|| anyhow!("Something went wrong. Couldn't select OTP type."))?;

        Ok(code_type.to_string())
    }

    fn code(&mut self) -> Result<String> {
        Ok(inquire::Text::new("One-Time Password:")
            .with_help_message("Please enter the one-time password sent to your email.")
            .with_render_config(self.render_config)
            .prompt()?)
    }
}

/// The interactive two-screen loop
#[derive(Debug)]
struct Session<T, P> {
    flow: FlowController<T>,
    prompter: P,
}

impl<T: OtpTransport, P: Prompter> Session<T, P> {
    fn new(transport: T, prompter: P) -> Self {
        Self {
            flow: FlowController::new(transport),
            prompter,
        }
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            match self.step().await {
                Ok(Some(notification)) => show(&notification),
                Ok(None) => {}
                Err(e) if is_cancellation(&e) => {
                    tracing::info!("Session ended by user");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Render the current phase's form once and submit it
    async fn step(&mut self) -> Result<Option<Notification>> {
        match self.flow.current_state() {
            FlowPhase::Collecting => self.collect().await?,
            FlowPhase::Verifying => self.verify().await?,
        }
        Ok(self.flow.take_notification())
    }

    async fn collect(&mut self) -> Result<()> {
        println!("Generate OTP");

        let mut form = GenerateForm::default();
        let request = loop {
            let prompter = &mut self.prompter;
            form.email = prompter.text("Email:", &form.email, "example@mail.com")?;
            form.code_type = prompter.select_code_type(&form.code_type)?;
            form.organization =
                prompter.text("Organisation:", &form.organization, "Your Organization")?;
            form.subject = prompter.text("Subject:", &form.subject, "Subject")?;

            match form.submit() {
                Ok(request) => break request,
                Err(errors) => print_field_errors(&errors),
            }
        };

        self.flow.dispatch(FlowEvent::SubmitProfile(request)).await?;

        Ok(())
    }

    async fn verify(&mut self) -> Result<()> {
        println!("Verify OTP for {}", self.flow.state().email);

        let request = loop {
            let code = self.prompter.code()?;

            match self.flow.verify_form(code).submit() {
                Ok(request) => break request,
                Err(errors) => print_field_errors(&errors),
            }
        };

        self.flow.dispatch(FlowEvent::SubmitCode(request)).await?;

        Ok(())
    }
}

fn is_cancellation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

fn print_field_errors(errors: &FieldErrors) {
    for (field, message) in errors.iter() {
        eprintln!("{field}: {message}");
    }
}

fn reject_input(errors: FieldErrors) -> anyhow::Error {
    print_field_errors(&errors);
    anyhow!("Invalid input, nothing was sent")
}

fn show(notification: &Notification) {
    let line = match notification.action {
        Some(action) => format!("{notification} [{action}]"),
        None => notification.to_string(),
    };
    match notification.kind {
        NotificationKind::Success => println!("{line}"),
        NotificationKind::Error => eprintln!("{line}"),
    }
}

fn finish_one_shot<T: OtpTransport>(flow: &mut FlowController<T>) -> Result<()> {
    let notification = flow
        .take_notification()
        .ok_or_else(|| anyhow!("Submission finished without an outcome"))?;

    show(&notification);

    if notification.is_error() {
        return Err(anyhow!("Request to the OTP provider failed"));
    }

    Ok(())
}

fn setup_tracing(ansi: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::from_default_env())
        .init();
}
