use std::sync::LazyLock;

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, no_escape,
};
use serde_json::{Map, Value};
use thiserror::Error;

use super::flows::{FlowId, FlowRequest};
use super::media::{DataUriError, parse_data_uri};

/// Brackets a media reference inside rendered text. Stripped from every string in the render
/// context, so only the `media` helper can emit it.
const MEDIA_MARKER: char = '\u{FFFC}';
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

const FAIR_PRICE_TEMPLATE: &str = "\
You are an AI-powered agricultural pricing expert. Based on the following information, suggest a fair price for the crop.

Crop Name: {{{cropName}}}
Crop Variety: {{{cropVariety}}}
Location: {{{location}}}
Quantity: {{{quantity}}} {{{unit}}}
Quality: {{{quality}}}

Consider current market prices, demand, and other relevant factors to determine a fair price. Provide a brief reasoning for your suggestion.

Output the fairPrice as a number.
";

const CROP_DISEASE_DETECTION_TEMPLATE: &str = "\
You are an AI Crop Disease Detection Expert.

Analyze the following crop photo.

{{media url=photoDataUri}}

You will analyze the photo of the crop and determine if there is a disease present. If there is a disease, you will provide the name of the disease, a confidence level (0-1), and suggested actions to take.

CRITICAL: Your entire response, including the diseaseName and suggestedActions, MUST be in the following language: {{{language}}}.
";

const CROP_DOCTOR_CHAT_TEMPLATE: &str = "\
You are an expert AI Crop Doctor specializing in plant diseases.
A user has just received an initial diagnosis and is asking follow-up questions.

Your knowledge is based on this initial diagnosis:
- Disease Name: {{{diseaseName}}}
- Initial Suggested Actions: {{{suggestedActions}}}

Your task is to answer the user's questions clearly and concisely. Provide more details about the disease, clarify the suggested actions, suggest preventative measures, or explain the potential impact if left untreated.
Be helpful, clear, and reassuring.

The user's message is:
\"{{{message}}}\"

{{#if history}}
This is the previous conversation history, for context:
{{#each history}}
    {{this.role}}: {{this.content}}
{{/each}}
{{/if}}

CRITICAL: Your entire response MUST be in the following language: {{{language}}}.
Your response should be just the reply text, without any extra formatting.
";

const FARMER_CHAT_TEMPLATE: &str = "\
You are a helpful and friendly AI assistant for an Indian farmer named {{{farmerName}}}.
Your goal is to answer questions from a potential buyer about the farmer's produce.
Be conversational, helpful, and answer their questions about the produce. Keep your answers concise and to the point.

{{#if cropDetails}}
Here is the information about the crop you are discussing:
- Crop Name: {{{cropName}}}
- Variety: {{{cropDetails.variety}}}
- Price: Rs. {{{cropDetails.price}}} per kg
- Organic: {{#if cropDetails.isOrganic}}Yes{{else}}No{{/if}}
- Freshness: {{{cropDetails.freshness}}}
Use the information above to answer the buyer's questions. You can also answer general questions about availability and quality.
{{else}}
The user is starting a general conversation with you. Answer their questions about the farmer's produce, availability, and quality.
If they ask about a specific crop, you can say that you don't have the details for that specific listing right now but can answer general questions.
{{/if}}

If the user asks a question you cannot answer, or if they seem unsatisfied, you should politely offer to connect them directly with the farmer. For example: \"I can't answer that, but I can connect you with farmer {{{farmerName}}}. Would you like to start a live chat or call them?\"

The user's message is:
\"{{{message}}}\"

{{#if history}}
This is the previous conversation history, for context:
{{#each history}}
    {{this.role}}: {{this.content}}
{{/each}}
{{/if}}

Your response should be just the reply text, without any extra formatting.
";

const DEMAND_FORECAST_TEMPLATE: &str = "\
You are an AI assistant that provides demand forecasts for crops.

Provide a demand forecast for {{crop}} in {{location}} for the next week.
The forecast should be a short sentence, including a percentage change.
For example: \"Tomatoes demand expected +15% next week.\"
";

const PRICE_PREDICTION_TEMPLATE: &str = "\
You are an AI agricultural market analyst. Based on the historical price data for the last 6 months, predict the price for the next month.

Crop Name: {{{cropName}}}

Historical Data (Price per kg):
{{#each historicalData}}
- {{{this.month}}}: Rs. {{{this.price}}}
{{/each}}

Analyze the trend and provide a predicted price for next month. Also, provide a short justification for your prediction based on the trend.
";

const STORAGE_AND_SCHEMES_TEMPLATE: &str = "\
You are an AI assistant providing recommendations to farmers in India.

You will receive the crop name, location, and farming experience of the farmer. Based on this information, you will provide:

1.  storageTips: AI-driven recommendations for storing the crop to reduce waste.
2.  govtSchemes: Government schemes relevant to the crop and farmer location.
3.  demandForecast: A demand forecast for the crop in the near future.

Crop Name: {{{cropName}}}
Location: {{{location}}}
Farming Experience: {{{farmingExperienceYears}}} years

Respond in a JSON format.
";

const TEXT_TO_SPEECH_TEMPLATE: &str = "{{{text}}}";

pub const fn template_source(flow: FlowId) -> &'static str {
    match flow {
        FlowId::FairPrice => FAIR_PRICE_TEMPLATE,
        FlowId::CropDiseaseDetection => CROP_DISEASE_DETECTION_TEMPLATE,
        FlowId::CropDoctorChat => CROP_DOCTOR_CHAT_TEMPLATE,
        FlowId::FarmerChat => FARMER_CHAT_TEMPLATE,
        FlowId::DemandForecast => DEMAND_FORECAST_TEMPLATE,
        FlowId::PricePrediction => PRICE_PREDICTION_TEMPLATE,
        FlowId::StorageAndSchemes => STORAGE_AND_SCHEMES_TEMPLATE,
        FlowId::TextToSpeech => TEXT_TO_SPEECH_TEMPLATE,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Media {
        mime_type: String,
        base64_data: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub parts: Vec<PromptPart>,
}

impl RenderedPrompt {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Media { .. } => None,
            })
            .collect()
    }

    pub fn media_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, PromptPart::Media { .. }))
            .count()
    }
}

#[derive(Debug, Error)]
pub enum PromptRenderError {
    #[error("prompt registry failed to build: {0}")]
    Registry(String),
    #[error("prompt for {flow} failed to render: {message}")]
    Render { flow: FlowId, message: String },
    #[error("prompt for {flow} references invalid media: {source}")]
    InvalidMedia { flow: FlowId, source: DataUriError },
}

static PROMPT_REGISTRY: LazyLock<Result<Handlebars<'static>, String>> =
    LazyLock::new(build_registry);

fn build_registry() -> Result<Handlebars<'static>, String> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    registry.register_helper("media", Box::new(media_helper));

    for flow in FlowId::ALL {
        registry
            .register_template_string(flow.as_str(), template_source(flow))
            .map_err(|err| format!("{flow}: {err}"))?;
    }

    Ok(registry)
}

fn media_helper(
    helper: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let url = helper
        .hash_get("url")
        .and_then(|param| param.value().as_str())
        .unwrap_or_default();
    if url.is_empty() {
        return Ok(());
    }

    let mut marker = [0_u8; 4];
    let marker = MEDIA_MARKER.encode_utf8(&mut marker);
    out.write(marker)?;
    out.write(url)?;
    out.write(marker)?;
    Ok(())
}

/// Renders the flow's template against a request. Pure: the same request always yields the
/// same parts.
pub fn render_prompt(request: &FlowRequest) -> Result<RenderedPrompt, PromptRenderError> {
    let flow = request.flow();
    let registry = PROMPT_REGISTRY
        .as_ref()
        .map_err(|message| PromptRenderError::Registry(message.clone()))?;

    let payload = serde_json::to_value(request).map_err(|err| PromptRenderError::Render {
        flow,
        message: err.to_string(),
    })?;
    let rendered = registry
        .render(flow.as_str(), &template_context(&payload))
        .map_err(|err| PromptRenderError::Render {
            flow,
            message: err.to_string(),
        })?;

    split_media(flow, &rendered)
}

fn split_media(flow: FlowId, rendered: &str) -> Result<RenderedPrompt, PromptRenderError> {
    let mut parts = Vec::new();
    for (index, segment) in rendered.split(MEDIA_MARKER).enumerate() {
        if index % 2 == 1 {
            let uri = parse_data_uri(segment)
                .map_err(|source| PromptRenderError::InvalidMedia { flow, source })?;
            parts.push(PromptPart::Media {
                mime_type: uri.mime_type.to_string(),
                base64_data: uri.base64_data.to_string(),
            });
        } else if !segment.is_empty() {
            parts.push(PromptPart::Text(segment.to_string()));
        }
    }

    Ok(RenderedPrompt { parts })
}

/// Prepares a request payload for rendering: integral floats print without a fractional
/// part and the media marker cannot be smuggled in through user text.
fn template_context(value: &Value) -> Value {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(float)
                if number.is_f64() && float.fract() == 0.0 && float.abs() < MAX_EXACT_INTEGER =>
            {
                Value::from(float as i64)
            }
            _ => value.clone(),
        },
        Value::String(text) if text.contains(MEDIA_MARKER) => {
            Value::String(text.replace(MEDIA_MARKER, ""))
        }
        Value::Array(items) => Value::Array(items.iter().map(template_context).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), template_context(field)))
                .collect::<Map<_, _>>(),
        ),
        _ => value.clone(),
    }
}
