use arboard::Clipboard;
use eframe::egui;
use egui::{Color32, RichText};
use egui_extras::{Column, TableBuilder};

use crate::config::Config;
use crate::map_host::DrawControl;
use crate::map_view::MapView;
use crate::record::{Action, AnnotationRecord};
use crate::session::{AnnotationSession, SessionError, SessionSettings, SubmitOutcome};
use crate::storage::FileStorage;
use crate::tooltip::Locale;

pub struct TreeMapApp {
    map: MapView,
    session: Option<AnnotationSession<FileStorage>>,
    show_records: bool,
    status: Option<(String, bool)>,
}

impl TreeMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &Config, storage: FileStorage) -> Self {
        let visuals = egui::Visuals::dark();
        cc.egui_ctx.set_visuals(visuals);

        let mut map = MapView::new(config.center(), config.zoom, config.tile_url.clone());
        let settings = SessionSettings {
            control: DrawControl::default(),
            locale: config.locale,
            expiry: config.expiry(),
        };
        tracing::info!(root = %storage.root().display(), "mounting annotations");
        let session = AnnotationSession::mount(storage, &mut map, settings);

        Self {
            map,
            session: Some(session),
            show_records: true,
            status: None,
        }
    }

    fn report(&mut self, message: impl Into<String>, is_error: bool) {
        let message = message.into();
        if is_error {
            tracing::error!("{message}");
        }
        self.status = Some((message, is_error));
    }

    fn export_geojson(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let geojson = session.store().to_geojson();
        let Some(path) = rfd::FileDialog::new()
            .add_filter("GeoJSON", &["geojson", "json"])
            .set_file_name("plantings.geojson")
            .save_file()
        else {
            return;
        };
        let result = serde_json::to_vec_pretty(&geojson)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&path, bytes).map_err(|e| e.to_string()));
        match result {
            Ok(()) => self.report(format!("Exported to {}", path.display()), false),
            Err(err) => self.report(format!("Export failed: {err}"), true),
        }
    }

    fn copy_json(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let result = session
            .store()
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| {
                Clipboard::new()
                    .and_then(|mut clipboard| clipboard.set_text(json))
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => self.report("Copied annotations to clipboard", false),
            Err(err) => self.report(format!("Copy failed: {err}"), true),
        }
    }

    fn clear_all(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        if let Err(err) = session.clear_all(&mut self.map) {
            self.report(format!("Could not clear annotations: {err}"), true);
        }
    }

    fn form_ui(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &mut self.session else {
            return;
        };
        let locale = session.locale();
        let editing = session.form().is_editing();

        ui.heading("Annotation");
        ui.separator();
        if !editing {
            ui.label(RichText::new("Draw a polygon to annotate it").weak());
        }

        let mut save = false;
        ui.add_enabled_ui(editing, |ui| {
            let form = session.form_mut();
            ui.label(locale.trees_caption());
            let count = ui.add(
                egui::TextEdit::singleline(&mut form.count)
                    .char_limit(10)
                    .hint_text("0"),
            );
            if count.changed() {
                form.keep_count_digits();
            }

            ui.label(locale.action_caption());
            let selected = match form.action {
                Action::Unset => locale.choose_action(),
                action => locale.action_name(action),
            };
            egui::ComboBox::from_id_salt("action")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut form.action, Action::Unset, locale.choose_action());
                    ui.selectable_value(
                        &mut form.action,
                        Action::Planting,
                        locale.action_name(Action::Planting),
                    );
                    ui.selectable_value(
                        &mut form.action,
                        Action::Cutting,
                        locale.action_name(Action::Cutting),
                    );
                });

            ui.add_space(8.0);
            let valid = form.validate().is_ok();
            save = ui
                .add_enabled(valid, egui::Button::new(locale.save()))
                .clicked();
            if let Err(err) = form.validate() {
                ui.label(RichText::new(err.to_string()).small().weak());
            }
        });

        if save {
            let result = session.submit(&mut self.map);
            if let Ok(outcome) = &result {
                if !outcome.matched {
                    tracing::warn!(shape = %outcome.submission.shape, "submitted shape has no saved record");
                }
            }
            let (message, is_error) = submit_status(&result, locale);
            self.report(message, is_error);
        }
    }

    fn records_ui(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let locale = session.locale();
        let store = session.store();
        let current = session.form().current_shape();
        ui.heading(format!("Records ({})", store.len()));
        ui.separator();
        if store.is_empty() {
            ui.label(RichText::new("Nothing saved yet").weak());
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong(locale.action_caption());
                });
                header.col(|ui| {
                    ui.strong(locale.trees_caption());
                });
                header.col(|ui| {
                    ui.strong("m²");
                });
            })
            .body(|mut body| {
                for (i, record) in store.records().iter().enumerate().rev() {
                    let is_current = current == Some(record.id);
                    body.row(18.0, |mut row| {
                        for cell in record_cells(i, record, locale) {
                            row.col(|ui| {
                                let text = RichText::new(cell);
                                ui.label(if is_current { text.strong() } else { text });
                            });
                        }
                    });
                }
            });
    }
}

/// Status line for a submit: message and whether it is an error.
fn submit_status(result: &Result<SubmitOutcome, SessionError>, locale: Locale) -> (String, bool) {
    match result {
        Ok(outcome) if !outcome.matched => ("Shape annotated".to_owned(), false),
        Ok(outcome) => (
            format!(
                "Saved: {} × {}",
                locale.action_name(outcome.submission.action),
                outcome.submission.count
            ),
            false,
        ),
        Err(err) => (format!("Could not save: {err}"), true),
    }
}

/// Number, action, tree count and area columns of the records table.
fn record_cells(index: usize, record: &AnnotationRecord, locale: Locale) -> [String; 4] {
    [
        (index + 1).to_string(),
        locale.action_name(record.action).to_owned(),
        record.count.to_string(),
        format!("{:.0}", record.area_m2()),
    ]
}

impl eframe::App for TreeMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let drawing = self.map.is_drawing();
                let draw_button = ui
                    .add_enabled_ui(self.map.has_draw_control(), |ui| {
                        ui.selectable_label(drawing, "⬟ Draw polygon")
                    })
                    .inner;
                if draw_button.clicked() {
                    self.map.set_drawing(!drawing);
                }

                if let Some((message, is_error)) = &self.status {
                    ui.separator();
                    let color = if *is_error { Color32::LIGHT_RED } else { Color32::LIGHT_GREEN };
                    ui.label(RichText::new(message).color(color));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.toggle_value(&mut self.show_records, "🗂 Records");
                    ui.separator();
                    if ui.button("💾 Export").clicked() {
                        self.export_geojson();
                    }
                    if ui.button("📋 Copy").clicked() {
                        self.copy_json();
                    }
                    if ui.button("🗑 Clear").clicked() {
                        self.clear_all();
                    }
                });
            });
        });

        egui::SidePanel::left("annotation_form")
            .default_width(220.0)
            .show(ctx, |ui| self.form_ui(ui));

        if self.show_records {
            egui::SidePanel::right("records_panel")
                .default_width(240.0)
                .show(ctx, |ui| self.records_ui(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let events = self.map.show(ui);
                let Some(session) = &mut self.session else {
                    return;
                };
                for event in events {
                    if let Err(err) = session.handle_event(&mut self.map, event) {
                        tracing::error!(%err, "could not record drawn shape");
                        self.status = Some((format!("Could not record shape: {err}"), true));
                    }
                }
            });
    }
}

impl Drop for TreeMapApp {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let storage = session.unmount(&mut self.map);
            tracing::info!(root = %storage.root().display(), "annotations unmounted");
        }
    }
}
