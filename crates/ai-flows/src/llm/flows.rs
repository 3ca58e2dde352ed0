use std::fmt;
use std::str::FromStr;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowId {
    FairPrice,
    CropDiseaseDetection,
    CropDoctorChat,
    FarmerChat,
    DemandForecast,
    PricePrediction,
    StorageAndSchemes,
    TextToSpeech,
}

/// Which model family serves a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Structured JSON output constrained by the flow's response schema.
    Structured,
    /// Raw PCM speech output.
    Speech,
}

impl FlowId {
    pub const ALL: [FlowId; 8] = [
        Self::FairPrice,
        Self::CropDiseaseDetection,
        Self::CropDoctorChat,
        Self::FarmerChat,
        Self::DemandForecast,
        Self::PricePrediction,
        Self::StorageAndSchemes,
        Self::TextToSpeech,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FairPrice => "fair_price",
            Self::CropDiseaseDetection => "crop_disease_detection",
            Self::CropDoctorChat => "crop_doctor_chat",
            Self::FarmerChat => "farmer_chat",
            Self::DemandForecast => "demand_forecast",
            Self::PricePrediction => "price_prediction",
            Self::StorageAndSchemes => "storage_and_schemes",
            Self::TextToSpeech => "text_to_speech",
        }
    }

    pub const fn model_kind(self) -> ModelKind {
        match self {
            Self::TextToSpeech => ModelKind::Speech,
            _ => ModelKind::Structured,
        }
    }

    /// Whether an overloaded or rate-limited upstream turns into an empty success instead
    /// of an error. Only voice output is best-effort.
    pub const fn degrades_on_unavailable(self) -> bool {
        matches!(self, Self::TextToSpeech)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFlowId(pub String);

impl fmt::Display for UnknownFlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown flow id '{}'", self.0)
    }
}

impl std::error::Error for UnknownFlowId {}

impl FromStr for FlowId {
    type Err = UnknownFlowId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        Self::ALL
            .into_iter()
            .find(|flow| flow.as_str() == normalized)
            .ok_or_else(|| UnknownFlowId(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FairPriceRequest {
    /// The name of the crop.
    pub crop_name: String,
    /// The variety of the crop.
    pub crop_variety: String,
    /// The city where the crop is being sold.
    pub location: String,
    /// The quantity of the crop being sold (e.g., in kg).
    pub quantity: f64,
    /// The unit of measurement for the crop quantity (e.g., kg, tons).
    pub unit: String,
    /// A description of the crop quality (e.g., fresh, organic, grade A).
    pub quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FairPriceResponse {
    /// The suggested fair price for the crop.
    #[schemars(range(min = 0))]
    pub fair_price: f64,
    /// The reasoning behind the suggested price.
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropDiseaseRequest {
    /// A photo of a crop, as a data URI that must include a MIME type and use Base64
    /// encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.
    #[schemars(regex(pattern = "^data:[^;,]+;base64,.+$"))]
    pub photo_data_uri: String,
    /// The language for the response (e.g., "en" for English, "hi" for Hindi).
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropDiseaseResponse {
    /// Whether or not a disease is detected.
    pub disease_detected: bool,
    /// The name of the detected disease, if any.
    pub disease_name: String,
    /// The confidence level of the disease detection (0-1).
    #[schemars(range(min = 0, max = 1))]
    pub confidence: f64,
    /// Suggested actions to take based on the disease detected.
    pub suggested_actions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropDoctorChatRequest {
    /// The name of the disease being discussed.
    pub disease_name: String,
    /// The initial suggested actions for the disease.
    pub suggested_actions: String,
    /// The user's follow-up question.
    pub message: String,
    /// The chat history between the user and the AI doctor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatTurn>>,
    /// The language for the response (e.g., "en" for English, "hi" for Hindi).
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropDetails {
    pub price: f64,
    pub is_organic: bool,
    pub freshness: String,
    pub variety: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FarmerChatRequest {
    /// The name of the crop being discussed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_name: Option<String>,
    /// The name of the farmer the user is chatting with.
    pub farmer_name: String,
    /// The user's message to the farmer.
    pub message: String,
    /// The chat history between the user and the farmer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatTurn>>,
    /// Details about the specific crop listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_details: Option<CropDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropDoctorChatResponse {
    /// The AI Crop Doctor's reply to the user.
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FarmerChatResponse {
    /// The farmer's reply to the user.
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DemandForecastRequest {
    /// The crop for which to forecast demand.
    pub crop: String,
    /// The location where the crop is grown.
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DemandForecastResponse {
    /// The demand forecast for the crop in the specified location.
    pub forecast: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricePoint {
    pub month: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricePredictionRequest {
    /// The name of the crop.
    pub crop_name: String,
    /// Historical price data for the last 6 months.
    pub historical_data: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricePredictionResponse {
    /// The predicted price for the next month.
    #[schemars(range(min = 0))]
    pub predicted_price: f64,
    /// A brief justification for the prediction.
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageAndSchemesRequest {
    /// The name of the crop for which recommendations are needed.
    pub crop_name: String,
    /// The location of the farmer.
    pub location: String,
    /// The number of years of farming experience of the farmer.
    pub farming_experience_years: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageAndSchemesResponse {
    /// Recommendations for storing the crop to reduce waste.
    pub storage_tips: Vec<String>,
    /// Government schemes relevant to the crop and farmer location.
    pub govt_schemes: Vec<String>,
    /// A demand forecast for the crop in the near future.
    pub demand_forecast: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeechLanguage {
    En,
    Hi,
}

impl SpeechLanguage {
    /// Prebuilt voice used for synthesis.
    pub const fn voice_name(self) -> &'static str {
        match self {
            Self::En => "Achernar",
            Self::Hi => "Algenib",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextToSpeechRequest {
    /// The text to be converted to speech.
    pub text: String,
    /// The language of the text (en or hi).
    pub language: SpeechLanguage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextToSpeechResponse {
    /// The synthesized audio as a WAV data URI, or null if synthesis was skipped.
    pub audio_data_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowRequest {
    FairPrice(FairPriceRequest),
    CropDiseaseDetection(CropDiseaseRequest),
    CropDoctorChat(CropDoctorChatRequest),
    FarmerChat(FarmerChatRequest),
    DemandForecast(DemandForecastRequest),
    PricePrediction(PricePredictionRequest),
    StorageAndSchemes(StorageAndSchemesRequest),
    TextToSpeech(TextToSpeechRequest),
}

impl FlowRequest {
    pub const fn flow(&self) -> FlowId {
        match self {
            Self::FairPrice(_) => FlowId::FairPrice,
            Self::CropDiseaseDetection(_) => FlowId::CropDiseaseDetection,
            Self::CropDoctorChat(_) => FlowId::CropDoctorChat,
            Self::FarmerChat(_) => FlowId::FarmerChat,
            Self::DemandForecast(_) => FlowId::DemandForecast,
            Self::PricePrediction(_) => FlowId::PricePrediction,
            Self::StorageAndSchemes(_) => FlowId::StorageAndSchemes,
            Self::TextToSpeech(_) => FlowId::TextToSpeech,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowResponse {
    FairPrice(FairPriceResponse),
    CropDiseaseDetection(CropDiseaseResponse),
    CropDoctorChat(CropDoctorChatResponse),
    FarmerChat(FarmerChatResponse),
    DemandForecast(DemandForecastResponse),
    PricePrediction(PricePredictionResponse),
    StorageAndSchemes(StorageAndSchemesResponse),
    TextToSpeech(TextToSpeechResponse),
}

impl FlowResponse {
    pub const fn flow(&self) -> FlowId {
        match self {
            Self::FairPrice(_) => FlowId::FairPrice,
            Self::CropDiseaseDetection(_) => FlowId::CropDiseaseDetection,
            Self::CropDoctorChat(_) => FlowId::CropDoctorChat,
            Self::FarmerChat(_) => FlowId::FarmerChat,
            Self::DemandForecast(_) => FlowId::DemandForecast,
            Self::PricePrediction(_) => FlowId::PricePrediction,
            Self::StorageAndSchemes(_) => FlowId::StorageAndSchemes,
            Self::TextToSpeech(_) => FlowId::TextToSpeech,
        }
    }
}

pub fn request_schema(flow: FlowId) -> Value {
    match flow {
        FlowId::FairPrice => serde_json::to_value(schema_for!(FairPriceRequest))
            .expect("fair price request schema should be serializable"),
        FlowId::CropDiseaseDetection => serde_json::to_value(schema_for!(CropDiseaseRequest))
            .expect("crop disease request schema should be serializable"),
        FlowId::CropDoctorChat => serde_json::to_value(schema_for!(CropDoctorChatRequest))
            .expect("crop doctor chat request schema should be serializable"),
        FlowId::FarmerChat => serde_json::to_value(schema_for!(FarmerChatRequest))
            .expect("farmer chat request schema should be serializable"),
        FlowId::DemandForecast => serde_json::to_value(schema_for!(DemandForecastRequest))
            .expect("demand forecast request schema should be serializable"),
        FlowId::PricePrediction => serde_json::to_value(schema_for!(PricePredictionRequest))
            .expect("price prediction request schema should be serializable"),
        FlowId::StorageAndSchemes => serde_json::to_value(schema_for!(StorageAndSchemesRequest))
            .expect("storage and schemes request schema should be serializable"),
        FlowId::TextToSpeech => serde_json::to_value(schema_for!(TextToSpeechRequest))
            .expect("text to speech request schema should be serializable"),
    }
}

pub fn output_schema(flow: FlowId) -> Value {
    match flow {
        FlowId::FairPrice => serde_json::to_value(schema_for!(FairPriceResponse))
            .expect("fair price output schema should be serializable"),
        FlowId::CropDiseaseDetection => serde_json::to_value(schema_for!(CropDiseaseResponse))
            .expect("crop disease output schema should be serializable"),
        FlowId::CropDoctorChat => serde_json::to_value(schema_for!(CropDoctorChatResponse))
            .expect("crop doctor chat output schema should be serializable"),
        FlowId::FarmerChat => serde_json::to_value(schema_for!(FarmerChatResponse))
            .expect("farmer chat output schema should be serializable"),
        FlowId::DemandForecast => serde_json::to_value(schema_for!(DemandForecastResponse))
            .expect("demand forecast output schema should be serializable"),
        FlowId::PricePrediction => serde_json::to_value(schema_for!(PricePredictionResponse))
            .expect("price prediction output schema should be serializable"),
        FlowId::StorageAndSchemes => serde_json::to_value(schema_for!(StorageAndSchemesResponse))
            .expect("storage and schemes output schema should be serializable"),
        FlowId::TextToSpeech => serde_json::to_value(schema_for!(TextToSpeechResponse))
            .expect("text to speech output schema should be serializable"),
    }
}

pub fn parse_request(flow: FlowId, payload: Value) -> Result<FlowRequest, serde_json::Error> {
    Ok(match flow {
        FlowId::FairPrice => FlowRequest::FairPrice(serde_json::from_value(payload)?),
        FlowId::CropDiseaseDetection => {
            FlowRequest::CropDiseaseDetection(serde_json::from_value(payload)?)
        }
        FlowId::CropDoctorChat => FlowRequest::CropDoctorChat(serde_json::from_value(payload)?),
        FlowId::FarmerChat => FlowRequest::FarmerChat(serde_json::from_value(payload)?),
        FlowId::DemandForecast => FlowRequest::DemandForecast(serde_json::from_value(payload)?),
        FlowId::PricePrediction => FlowRequest::PricePrediction(serde_json::from_value(payload)?),
        FlowId::StorageAndSchemes => {
            FlowRequest::StorageAndSchemes(serde_json::from_value(payload)?)
        }
        FlowId::TextToSpeech => FlowRequest::TextToSpeech(serde_json::from_value(payload)?),
    })
}

pub fn parse_output(flow: FlowId, payload: Value) -> Result<FlowResponse, serde_json::Error> {
    Ok(match flow {
        FlowId::FairPrice => FlowResponse::FairPrice(serde_json::from_value(payload)?),
        FlowId::CropDiseaseDetection => {
            FlowResponse::CropDiseaseDetection(serde_json::from_value(payload)?)
        }
        FlowId::CropDoctorChat => FlowResponse::CropDoctorChat(serde_json::from_value(payload)?),
        FlowId::FarmerChat => FlowResponse::FarmerChat(serde_json::from_value(payload)?),
        FlowId::DemandForecast => FlowResponse::DemandForecast(serde_json::from_value(payload)?),
        FlowId::PricePrediction => {
            FlowResponse::PricePrediction(serde_json::from_value(payload)?)
        }
        FlowId::StorageAndSchemes => {
            FlowResponse::StorageAndSchemes(serde_json::from_value(payload)?)
        }
        FlowId::TextToSpeech => FlowResponse::TextToSpeech(serde_json::from_value(payload)?),
    })
}
