//! Built-in sample payloads used when no `--file` is given

use qnactl_core::models::{
    MetadataDto, QnaDto, UpdateKbAdd, UpdateKbDelete, UpdateKbOperationDto, UpdateKbUpdate,
};
use qnactl_core::CreateKbDto;

const SOURCE: &str = "Custom Editorial";

/// A one-entry FAQ knowledge base
pub fn create_kb() -> CreateKbDto {
    CreateKbDto {
        name: "QnA Maker FAQ".to_string(),
        qna_list: vec![QnaDto {
            id: Some(0),
            answer: "You can use our REST APIs to manage your Knowledge Base. See here for details: https://westus.dev.cognitive.microsoft.com/docs/services/58994a073d9e04097c7ba6fe/operations/58994a073d9e041ad42d9baa".to_string(),
            source: Some(SOURCE.to_string()),
            questions: vec!["How do I programmatically update my Knowledge Base?".to_string()],
            metadata: vec![MetadataDto::new("category", "api")],
        }],
        urls: vec![],
        files: vec![],
    }
}

/// Adds one entry, renames the knowledge base and deletes entry 0
pub fn update_kb() -> UpdateKbOperationDto {
    UpdateKbOperationDto {
        add: Some(UpdateKbAdd {
            qna_list: vec![QnaDto {
                id: Some(1),
                answer: "You can change the default message if you use the QnAMakerDialog. See this for details: https://docs.botframework.com/en-us/azure-bot-service/templates/qnamaker/#navtitle".to_string(),
                source: Some(SOURCE.to_string()),
                questions: vec!["How can I change the default message from QnA Maker?".to_string()],
                metadata: vec![MetadataDto::new("category", "api")],
            }],
            ..Default::default()
        }),
        update: Some(UpdateKbUpdate {
            name: Some("New KB name".to_string()),
        }),
        delete: Some(UpdateKbDelete {
            ids: vec![0],
            sources: vec![],
        }),
    }
}
