//! Interactive surface
//!
//! One window, rendered from the current session state every frame. The
//! update loop computes the state, performs at most the one transition the
//! user asked for, and draws the result. Recognition is blocking; it is
//! scheduled on one frame and executed at the top of the next so the busy
//! spinner gets painted first.

use std::path::{Path, PathBuf};

use eframe::egui;
use egui::load::SizedTexture;
use egui::RichText;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::WorkflowError;
use crate::session::{Session, SessionState};
use crate::storage;
use crate::ui::theme::{self, ThemeColors};
use crate::vision::{self, RecognitionPipeline};

/// The main application window.
pub struct WorkflowApp {
    /// Per-user workflow state; one instance per running app.
    session: Session,
    /// External decode + recognition capability.
    pipeline: RecognitionPipeline,
    config: AppConfig,
    view: ViewState,
    theme_applied: bool,
}

/// Presentation-only state. Cleared whenever a new upload starts.
#[derive(Default)]
struct ViewState {
    /// Path typed into the loader field.
    path_input: String,
    /// Recognition requested; one spinner frame renders first.
    pending_recognize: bool,
    /// Recognition runs at the top of the current frame.
    recognize_armed: bool,
    /// Last workflow error, shown in the banner.
    error: Option<String>,
    /// Whether the banner offers a retry on the unchanged blob.
    error_retryable: bool,
    /// Where the last CSV export was written.
    last_export: Option<PathBuf>,
    /// Preview texture for the current upload.
    preview_texture: Option<egui::TextureHandle>,
}

impl WorkflowApp {
    pub fn new(config: AppConfig, pipeline: RecognitionPipeline) -> Self {
        Self {
            session: Session::new(),
            pipeline,
            config,
            view: ViewState::default(),
            theme_applied: false,
        }
    }

    /// Create eframe options for the main window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([920.0, 680.0])
                .with_min_inner_size([640.0, 480.0])
                .with_title("Medscan"),
            ..Default::default()
        }
    }

    fn set_error(&mut self, err: &WorkflowError) {
        self.view.error = Some(err.to_string());
        self.view.error_retryable = err.is_retryable();
    }

    fn is_busy(&self) -> bool {
        self.view.pending_recognize || self.view.recognize_armed
    }

    /// Two-phase dispatch for the blocking recognition transition: a
    /// request first arms, which guarantees one frame with the spinner on
    /// screen, then the armed call runs at the top of the frame after.
    fn run_pending_recognition(&mut self, ctx: &egui::Context) {
        if self.view.recognize_armed {
            self.view.recognize_armed = false;
            match self.session.recognize(&mut self.pipeline) {
                Ok(()) => {
                    self.view.error = None;
                }
                Err(err) => {
                    warn!("recognition transition failed: {err}");
                    self.set_error(&err);
                }
            }
            return;
        }

        if self.view.pending_recognize {
            self.view.pending_recognize = false;
            self.view.recognize_armed = true;
            ctx.request_repaint();
        }
    }

    /// Accept files dropped onto the window.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };

        if let Some(path) = file.path {
            self.load_upload_from_path(ctx, &path);
        } else if let Some(bytes) = file.bytes {
            self.load_upload(ctx, file.name.clone(), bytes.to_vec());
        }
    }

    fn load_upload_from_path(&mut self, ctx: &egui::Context, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match std::fs::read(path) {
            Ok(bytes) => self.load_upload(ctx, name, bytes),
            Err(e) => {
                self.view.error = Some(format!("could not read {}: {e}", path.display()));
                self.view.error_retryable = false;
            }
        }
    }

    /// Dispatch the upload transition and prepare the preview.
    fn load_upload(&mut self, ctx: &egui::Context, name: String, bytes: Vec<u8>) {
        self.view = ViewState {
            path_input: std::mem::take(&mut self.view.path_input),
            ..ViewState::default()
        };

        // Decode for the preview up front; the blob is stored either way so
        // a failed decode stays visible as an Uploaded session with an
        // error banner.
        let prepared = vision::prepare_upload(&bytes, self.config.recognition.max_image_size);
        self.session.upload(name, bytes);

        match prepared {
            Ok(prepared) => {
                let color_image = egui::ColorImage::from_rgba_unmultiplied(
                    [prepared.width as usize, prepared.height as usize],
                    prepared.raster.as_raw(),
                );
                let texture =
                    ctx.load_texture("upload_preview", color_image, egui::TextureOptions::LINEAR);
                self.view.preview_texture = Some(texture);

                if self.config.general.auto_recognize {
                    self.view.pending_recognize = true;
                    ctx.request_repaint();
                }
            }
            Err(err) => {
                // Undecodable upload: report now, keep the session in
                // Uploaded so the failure stays visible until the user
                // moves on.
                self.set_error(&err);
            }
        }
    }

    /// Dispatch the export transition and write the artifact to disk.
    fn export_csv(&mut self) {
        let Some(artifact) = self.session.export() else {
            return;
        };

        let target_dir = match self.config.export.output_dir.clone() {
            Some(dir) => Ok(dir),
            None => storage::default_export_dir(),
        };

        match target_dir {
            Ok(dir) => {
                let path = dir.join(&artifact.file_name);
                match std::fs::write(&path, &artifact.data) {
                    Ok(()) => {
                        info!(path = %path.display(), "CSV export written");
                        self.view = ViewState {
                            last_export: Some(path),
                            ..ViewState::default()
                        };
                    }
                    Err(e) => {
                        self.view = ViewState::default();
                        self.view.error =
                            Some(format!("could not write {}: {e}", path.display()));
                    }
                }
            }
            Err(e) => {
                self.view = ViewState::default();
                self.view.error = Some(format!("no export directory available: {e}"));
            }
        }
    }

    /// Dispatch the restart transition.
    fn start_over(&mut self) {
        self.session.restart();
        self.view = ViewState::default();
    }

    fn render_error_banner(&mut self, ui: &mut egui::Ui) {
        let Some(message) = self.view.error.clone() else {
            return;
        };

        ui.horizontal(|ui| {
            ui.label(RichText::new(message).color(ThemeColors::ACCENT_ERROR));
            if self.view.error_retryable && ui.small_button("Retry").clicked() {
                self.view.error = None;
                self.view.pending_recognize = true;
                ui.ctx().request_repaint();
            }
            if ui.small_button("Dismiss").clicked() {
                self.view.error = None;
            }
        });
        ui.add_space(8.0);
    }

    fn render_empty(&mut self, ui: &mut egui::Ui) {
        if let Some(path) = &self.view.last_export {
            ui.label(
                RichText::new(format!("Saved {}", path.display()))
                    .color(ThemeColors::ACCENT_SUCCESS),
            );
            ui.add_space(8.0);
        }

        egui::Frame::none()
            .fill(ThemeColors::BG_MEDIUM)
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(24.0)
            .show(ui, |ui| {
                ui.label(
                    RichText::new("Drop an image anywhere in this window (JPG/PNG)")
                        .size(17.0)
                        .color(ThemeColors::TEXT_SECONDARY),
                );
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    ui.label("Image path:");
                    ui.text_edit_singleline(&mut self.view.path_input);
                    if ui.button("Load").clicked() {
                        let path = PathBuf::from(self.view.path_input.trim());
                        let ctx = ui.ctx().clone();
                        self.load_upload_from_path(&ctx, &path);
                    }
                });
            });
    }

    fn render_preview(&self, ui: &mut egui::Ui) {
        match (&self.view.preview_texture, self.session.uploaded_image()) {
            (Some(texture), Some(upload)) => {
                let tex_size = texture.size_vec2();
                let max_width = ui.available_width().min(560.0);
                let scale = (max_width / tex_size.x).min(1.0);
                ui.add(egui::Image::new(SizedTexture::new(
                    texture.id(),
                    tex_size * scale,
                )));
                ui.label(
                    RichText::new(upload.name())
                        .small()
                        .color(ThemeColors::TEXT_MUTED),
                );
            }
            (None, Some(_)) => {
                ui.label(
                    RichText::new("Preview unavailable")
                        .italics()
                        .color(ThemeColors::TEXT_MUTED),
                );
            }
            _ => {}
        }
    }

    fn render_uploaded(&mut self, ui: &mut egui::Ui) {
        self.render_preview(ui);
        ui.add_space(12.0);

        if self.is_busy() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("Extracting text...").color(ThemeColors::TEXT_SECONDARY));
            });
            return;
        }

        // Either recognition failed (banner above handles retry) or
        // auto-run is off and the user triggers it here.
        if self.view.error.is_none() && ui.button("Extract text").clicked() {
            self.view.pending_recognize = true;
            ui.ctx().request_repaint();
        }
    }

    fn render_processed(&mut self, ui: &mut egui::Ui) {
        self.render_preview(ui);
        ui.add_space(12.0);

        ui.label(RichText::new("Extracted text").size(17.0).strong());
        egui::Frame::none()
            .fill(ThemeColors::BG_MEDIUM)
            .rounding(egui::Rounding::same(6.0))
            .inner_margin(12.0)
            .show(ui, |ui| {
                match self.session.extracted_text() {
                    Some("") | None => {
                        ui.label(
                            RichText::new("(no text found)")
                                .italics()
                                .color(ThemeColors::TEXT_MUTED),
                        );
                    }
                    Some(text) => {
                        ui.label(RichText::new(text).monospace());
                    }
                }
            });

        ui.add_space(16.0);
        ui.label(RichText::new("What do you want to do?").color(ThemeColors::TEXT_SECONDARY));
        ui.horizontal(|ui| {
            if ui.button("Save CSV").clicked() {
                self.export_csv();
            }
            if ui.button("Start over").clicked() {
                self.start_over();
            }
        });
    }
}

impl eframe::App for WorkflowApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        // Scheduled work first: the previous frame already painted the
        // spinner for anything armed here.
        self.run_pending_recognition(ctx);
        self.handle_dropped_files(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none().inner_margin(24.0).show(ui, |ui| {
                ui.heading(RichText::new("Handwritten Notes OCR").size(24.0).strong());
                ui.label(
                    RichText::new(
                        "Load a photo of a handwritten note; the extracted text can be saved as a CSV row.",
                    )
                    .color(ThemeColors::TEXT_SECONDARY),
                );
                ui.add_space(16.0);

                self.render_error_banner(ui);

                match self.session.state() {
                    SessionState::Empty => self.render_empty(ui),
                    SessionState::Uploaded => self.render_uploaded(ui),
                    SessionState::Processed => self.render_processed(ui),
                }
            });
        });
    }
}

/// Run the application window (blocking).
pub fn run_app(config: AppConfig, pipeline: RecognitionPipeline) -> Result<(), eframe::Error> {
    let app = WorkflowApp::new(config, pipeline);
    eframe::run_native(
        "Medscan",
        WorkflowApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
