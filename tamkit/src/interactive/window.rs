use super::InteractiveSegmenter;
use anyhow::{anyhow, Result};
use eframe::{egui, App, CreationContext};
use egui::{ColorImage, Key, PointerButton, Sense, TextureHandle, TextureOptions};
use log::{error, info};
use std::path::PathBuf;
use tamkit_inference::inference::sam::image_inference::SamImageInference;

const WINDOW_TITLE: &str = "Interactive Segmentation - EdgeTAM";

struct SegmenterApp<M: SamImageInference> {
    segmenter: InteractiveSegmenter<M>,
    output: PathBuf,
    texture: Option<TextureHandle>,
    dirty: bool,
    status: String,
}

impl<M: SamImageInference> SegmenterApp<M> {
    fn new(segmenter: InteractiveSegmenter<M>, output: PathBuf) -> Self {
        Self {
            segmenter,
            output,
            texture: None,
            dirty: true,
            status: super::CONTROLS.to_string(),
        }
    }

    fn report(&mut self, result: Result<()>, done: String) {
        match result {
            Ok(()) => self.status = done,
            Err(e) => {
                error!("{:#}", e);
                self.status = format!("Error: {:#}", e);
            }
        }
        self.dirty = true;
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if !self.dirty && self.texture.is_some() {
            return;
        }
        match self.segmenter.visualization() {
            Ok(vis) => {
                let (width, height) = vis.get_size();
                let image = ColorImage::from_rgb([width as usize, height as usize], vis.raw_data());
                match &mut self.texture {
                    Some(texture) => texture.set(image, TextureOptions::default()),
                    None => {
                        self.texture = Some(ctx.load_texture("segmentation", image, TextureOptions::default()))
                    }
                }
            }
            Err(e) => self.status = format!("Error: {:#}", e),
        }
        self.dirty = false;
    }
}

impl<M: SamImageInference> App for SegmenterApp<M> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (reset, save, quit) = ctx.input(|i| {
            (
                i.key_pressed(Key::R),
                i.key_pressed(Key::S),
                i.key_pressed(Key::Q) || i.key_pressed(Key::Escape),
            )
        });

        if quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }
        if reset {
            self.segmenter.reset();
            self.report(Ok(()), "Reset to initial segmentation".to_string());
        }
        if save {
            let result = self.segmenter.save_mask(&self.output);
            let done = format!("Mask saved to: {}", self.output.display());
            self.report(result, done);
        }

        self.refresh_texture(ctx);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });

        let mut click = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(texture) = &self.texture else {
                return;
            };
            egui::ScrollArea::both().show(ui, |ui| {
                let response = ui.add(
                    egui::Image::new((texture.id(), texture.size_vec2()))
                        .fit_to_original_size(1.0)
                        .sense(Sense::click()),
                );
                let button = if response.clicked_by(PointerButton::Primary) {
                    Some(true)
                } else if response.clicked_by(PointerButton::Secondary) {
                    Some(false)
                } else {
                    None
                };
                if let (Some(is_positive), Some(pos)) = (button, response.interact_pointer_pos()) {
                    let size = texture.size_vec2();
                    let rect = response.rect;
                    let x = (pos.x - rect.min.x) * size.x / rect.width();
                    let y = (pos.y - rect.min.y) * size.y / rect.height();
                    click = Some((x, y, is_positive));
                }
            });
        });

        if let Some((x, y, is_positive)) = click {
            let result = self.segmenter.add_point(x, y, is_positive);
            let kind = if is_positive { "positive" } else { "negative" };
            self.report(result, format!("Added {} point at ({:.0}, {:.0})", kind, x, y));
        }
    }
}

/// Opens the refinement window and blocks until it is closed.
pub fn run_window<M>(segmenter: InteractiveSegmenter<M>, output: PathBuf) -> Result<()>
where
    M: SamImageInference + 'static,
    M::Embedding: 'static,
{
    let (width, height) = segmenter.image().get_size();
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([width.min(1600) as f32, height.min(1000) as f32 + 30.0]),
        ..Default::default()
    };
    info!("Interactive mode started!");

    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |_cc: &CreationContext| Box::new(SegmenterApp::new(segmenter, output))),
    )
    .map_err(|e| anyhow!("Failed to run interactive window: {}", e))
}
